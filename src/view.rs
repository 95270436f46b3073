//! Derived views over a transaction sequence: filtering, grouping into buckets and totals.
//!
//! Everything here is a pure function of its inputs. Views are recomputed from scratch every time
//! and never written back to the store.

use crate::model::{Kind, Transaction};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use tracing::warn;

/// How transactions are grouped into buckets.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Grouping {
    /// A single bucket labeled "All".
    #[default]
    None,
    /// One bucket per calendar month.
    Month,
    /// Two buckets per calendar month: days 1–15 and 16 to the end.
    HalfMonth,
    /// A single bucket holding the last N days.
    Trailing,
    /// A single bucket holding the current calendar month.
    CurrentMonth,
}

serde_plain::derive_display_from_serialize!(Grouping);
serde_plain::derive_fromstr_from_deserialize!(Grouping);

impl Grouping {
    /// A short description used in the overall heading, e.g. "Overall (Monthly)".
    pub fn describe(&self, days: u32) -> String {
        match self {
            Grouping::None => "All".to_string(),
            Grouping::Month => "Monthly".to_string(),
            Grouping::HalfMonth => "Every 15 Days".to_string(),
            Grouping::Trailing => format!("Last {days} Days"),
            Grouping::CurrentMonth => "This Month".to_string(),
        }
    }
}

/// The order of rows within a bucket. Totals do not depend on it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Order {
    /// Insertion order.
    #[default]
    Inserted,
    /// Newest first, ties in insertion order.
    Newest,
}

serde_plain::derive_display_from_serialize!(Order);
serde_plain::derive_fromstr_from_deserialize!(Order);

/// Criteria applied before grouping. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Inclusive lower bound on the calendar date.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the calendar date.
    pub to: Option<NaiveDate>,
    /// Case-insensitive substring of the note, or substring of the amount's decimal text.
    pub search: Option<String>,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.search().is_none()
    }

    /// Only the date range of this filter.
    pub fn date_range(&self) -> Filter {
        Filter {
            from: self.from,
            to: self.to,
            search: None,
        }
    }

    fn search(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn matches(&self, transaction: &Transaction) -> bool {
        let day = transaction.date().day();
        if self.from.is_some_and(|from| day < from) {
            return false;
        }
        if self.to.is_some_and(|to| day > to) {
            return false;
        }
        match self.search() {
            None => true,
            Some(query) => {
                let query = query.to_lowercase();
                transaction.note().to_lowercase().contains(&query)
                    || transaction.amount().text().contains(&query)
            }
        }
    }
}

/// Everything needed to derive a `View` besides the transactions themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewOptions {
    pub grouping: Grouping,
    /// Window size for `Grouping::Trailing`.
    pub days: u32,
    pub order: Order,
    pub filter: Filter,
}

/// The (income, expense, balance) triple over a set of transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub income: Decimal,
    pub expense: Decimal,
    pub balance: Decimal,
}

impl Totals {
    pub fn of<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut income = Decimal::ZERO;
        let mut expense = Decimal::ZERO;
        for t in transactions {
            match t.kind() {
                Kind::Income => income = saturating_add(income, t.amount().value()),
                Kind::Expense => expense = saturating_add(expense, t.amount().value()),
            }
        }
        Self {
            income,
            expense,
            balance: saturating_add(income, -expense),
        }
    }
}

/// Stored documents are not bounded the way new amounts are, so a sum may exceed what `Decimal`
/// holds. It then stays at the limit.
fn saturating_add(total: Decimal, amount: Decimal) -> Decimal {
    total.checked_add(amount).unwrap_or_else(|| {
        warn!("A total overflowed while adding {amount}, it is capped");
        if amount.is_sign_negative() {
            Decimal::MIN
        } else {
            Decimal::MAX
        }
    })
}

/// First or second half of a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Half {
    /// Days 1 through 15.
    First,
    /// Day 16 through the end of the month.
    Second,
}

/// Identifies a bucket. Sorting descending puts the most recent period first, with `All` ahead of
/// everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketKey {
    Period {
        year: i32,
        month: u32,
        half: Option<Half>,
    },
    Window,
    All,
}

impl BucketKey {
    fn label(&self, grouping: Grouping, days: u32) -> String {
        match self {
            BucketKey::All => "All".to_string(),
            BucketKey::Window => grouping.describe(days),
            BucketKey::Period { year, month, half } => match half {
                None => format!("{year}-{month:02}"),
                Some(Half::First) => format!("{year}-{month:02} (1–15)"),
                Some(Half::Second) => format!("{year}-{month:02} (16–end)"),
            },
        }
    }
}

/// A transaction along with its position in the full loaded sequence. `index` is what
/// `Session::delete_at` expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub index: usize,
    pub transaction: Transaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub key: BucketKey,
    pub label: String,
    pub rows: Vec<Row>,
    pub totals: Totals,
}

/// What a renderer receives: the buckets, most recent first, and totals over all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub grouping: Grouping,
    pub buckets: Vec<Bucket>,
    pub overall: Totals,
}

impl View {
    /// Every row in bucket order.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.buckets.iter().flat_map(|b| b.rows.iter())
    }
}

/// Derives a `View`. `now` anchors the relative groupings.
pub fn build(transactions: &[Transaction], options: &ViewOptions, now: DateTime<Utc>) -> View {
    let mut groups: BTreeMap<BucketKey, Vec<Row>> = BTreeMap::new();
    for (index, transaction) in transactions.iter().enumerate() {
        if !options.filter.matches(transaction) {
            continue;
        }
        if let Some(key) = bucket_key(transaction, options, now) {
            groups.entry(key).or_default().push(Row {
                index,
                transaction: transaction.clone(),
            });
        }
    }

    // Single-bucket groupings always produce their bucket, even when it is empty.
    match options.grouping {
        Grouping::None => {
            groups.entry(BucketKey::All).or_default();
        }
        Grouping::Trailing | Grouping::CurrentMonth => {
            groups.entry(BucketKey::Window).or_default();
        }
        Grouping::Month | Grouping::HalfMonth => {}
    }

    let buckets: Vec<Bucket> = groups
        .into_iter()
        .rev()
        .map(|(key, mut rows)| {
            if options.order == Order::Newest {
                // Stable, so equal dates keep insertion order.
                rows.sort_by(|a, b| b.transaction.date().cmp(a.transaction.date()));
            }
            Bucket {
                key,
                label: key.label(options.grouping, options.days),
                totals: Totals::of(rows.iter().map(|r| &r.transaction)),
                rows,
            }
        })
        .collect();

    let overall = Totals::of(buckets.iter().flat_map(|b| b.rows.iter().map(|r| &r.transaction)));
    View {
        grouping: options.grouping,
        buckets,
        overall,
    }
}

/// Returns the bucket for `transaction`, or `None` if it falls outside a relative window.
fn bucket_key(
    transaction: &Transaction,
    options: &ViewOptions,
    now: DateTime<Utc>,
) -> Option<BucketKey> {
    let date = transaction.date();
    match options.grouping {
        Grouping::None => Some(BucketKey::All),
        Grouping::Month => Some(BucketKey::Period {
            year: date.year(),
            month: date.month(),
            half: None,
        }),
        Grouping::HalfMonth => Some(BucketKey::Period {
            year: date.year(),
            month: date.month(),
            half: Some(if date.day_of_month() <= 15 {
                Half::First
            } else {
                Half::Second
            }),
        }),
        Grouping::Trailing => {
            let at = date.instant().with_timezone(&Utc);
            // A window reaching past the earliest representable date has no lower bound.
            let start = Duration::try_days(i64::from(options.days))
                .and_then(|days| now.checked_sub_signed(days));
            (start.is_none_or(|start| at >= start) && at <= now).then_some(BucketKey::Window)
        }
        Grouping::CurrentMonth => {
            let today = now.date_naive();
            (date.year() == today.year() && date.month() == today.month())
                .then_some(BucketKey::Window)
        }
    }
}

impl Display for Totals {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "income {}, expense {}, balance {}",
            self.income, self.expense, self.balance
        )
    }
}
