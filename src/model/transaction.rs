use crate::error::{Error, ErrorType};
use crate::model::{Amount, TxnDate};
use crate::Result;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::str::FromStr;

/// Whether money came in or went out.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Income,
    Expense,
}

serde_plain::derive_display_from_serialize!(Kind);
serde_plain::derive_fromstr_from_deserialize!(Kind);

/// A single record of the stored document, e.g.
///
/// ```json
/// {
///   "amount": 100,
///   "type": "income",
///   "note": "salary",
///   "date": "2024-01-10T08:30:00.000Z"
/// }
/// ```
///
/// Records are never edited once stored. They are distinguished only by their position in the
/// sequence.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(from = "StoredRecord")]
pub struct Transaction {
    /// Always positive for records created by this program. A malformed stored amount counts as
    /// zero.
    pub(crate) amount: Amount,
    pub(crate) kind: Kind,
    pub(crate) note: String,
    pub(crate) date: TxnDate,
    /// The amount exactly as it was stored, when writing `amount` would not reproduce it, e.g.
    /// `"abc"` or `"12.5"`.
    pub(crate) stored_amount: Option<Value>,
}

#[derive(Deserialize)]
struct StoredRecord {
    #[serde(default)]
    amount: Value,
    #[serde(rename = "type")]
    kind: Kind,
    #[serde(default)]
    note: String,
    date: TxnDate,
}

impl From<StoredRecord> for Transaction {
    fn from(record: StoredRecord) -> Self {
        let amount = Amount::deserialize(&record.amount).unwrap_or(Amount::ZERO);
        let rewritten = serde_json::to_value(amount).ok();
        let stored_amount = (rewritten.as_ref() != Some(&record.amount)).then_some(record.amount);
        Self {
            amount,
            kind: record.kind,
            note: record.note,
            date: record.date,
            stored_amount,
        }
    }
}

#[derive(Serialize)]
struct RecordOut<'a> {
    amount: AmountOut<'a>,
    #[serde(rename = "type")]
    kind: Kind,
    note: &'a str,
    date: &'a TxnDate,
}

#[derive(Serialize)]
#[serde(untagged)]
enum AmountOut<'a> {
    Stored(&'a Value),
    Amount(Amount),
}

impl Serialize for Transaction {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let amount = match &self.stored_amount {
            Some(stored) => AmountOut::Stored(stored),
            None => AmountOut::Amount(self.amount),
        };
        RecordOut {
            amount,
            kind: self.kind,
            note: &self.note,
            date: &self.date,
        }
        .serialize(serializer)
    }
}

impl Transaction {
    /// Creates a transaction, rejecting amounts that are not greater than zero, that are too
    /// large, or that the stored document cannot hold exactly.
    pub fn new(
        amount: Amount,
        kind: Kind,
        note: impl Into<String>,
        date: TxnDate,
    ) -> Result<Self> {
        if !amount.is_positive() {
            return Err(Error::msg(
                ErrorType::Validation,
                format!("Amount must be greater than zero, got {}", amount.text()),
            ));
        }
        if !amount.within_limit() {
            return Err(Error::msg(
                ErrorType::Validation,
                format!("Amount {} is too large", amount.text()),
            ));
        }
        if !amount.round_trips() {
            return Err(Error::msg(
                ErrorType::Validation,
                format!("Amount {} has more precision than can be stored", amount.text()),
            ));
        }
        Ok(Self {
            amount,
            kind,
            note: note.into().trim().to_string(),
            date,
            stored_amount: None,
        })
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn date(&self) -> &TxnDate {
        &self.date
    }

    pub fn is_income(&self) -> bool {
        self.kind == Kind::Income
    }
}

/// Unvalidated input for a new transaction, as it arrives from the command line.
#[derive(Debug, Clone, Default)]
pub struct NewTransaction {
    /// The amount as typed by the user.
    pub amount: Option<String>,
    /// `income` or `expense`.
    pub kind: Option<String>,
    pub note: Option<String>,
    /// Defaults to now.
    pub date: Option<String>,
}

impl NewTransaction {
    pub fn new(amount: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            amount: Some(amount.into()),
            kind: Some(kind.into()),
            note: None,
            date: None,
        }
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Validates the input and builds a `Transaction`. All failures are `ErrorType::Validation`.
    pub fn validate(self) -> Result<Transaction> {
        let amount_text = self
            .amount
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::msg(ErrorType::Validation, "An amount is required"))?;
        let amount = Amount::from_str(&amount_text).map_err(|e| {
            Error::msg(
                ErrorType::Validation,
                format!("Amount '{amount_text}' is not a number: {e}"),
            )
        })?;

        let kind_text = self
            .kind
            .ok_or_else(|| Error::msg(ErrorType::Validation, "A type is required"))?;
        let kind = Kind::from_str(kind_text.trim()).map_err(|_| {
            Error::msg(
                ErrorType::Validation,
                format!("Type must be 'income' or 'expense', got '{kind_text}'"),
            )
        })?;

        let date = match self.date {
            Some(text) => TxnDate::from_str(&text)
                .map_err(|e| Error::new(ErrorType::Validation, e))?,
            None => TxnDate::now(),
        };

        Transaction::new(amount, kind, self.note.unwrap_or_default(), date)
    }
}
