//! Writes a subset of the transactions to a local pretty-printed JSON file.

use crate::model::{snapshot, Transaction};
use crate::view::Filter;
use crate::{utils, Res};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which transactions an export contains.
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
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// The full loaded sequence.
    #[default]
    All,
    /// Only the date range of the filter.
    Range,
    /// The date range and the search of the filter.
    Filtered,
}

serde_plain::derive_display_from_serialize!(Scope);
serde_plain::derive_fromstr_from_deserialize!(Scope);

/// Selects the transactions for `scope`, in stored order.
pub fn select(transactions: &[Transaction], scope: Scope, filter: &Filter) -> Vec<Transaction> {
    let filter = match scope {
        Scope::All => return transactions.to_vec(),
        Scope::Range => filter.date_range(),
        Scope::Filtered => filter.clone(),
    };
    transactions
        .iter()
        .filter(|t| filter.matches(t))
        .cloned()
        .collect()
}

/// The file name used when none is given, e.g. `cashflow-all-2024-03-20.json`.
pub fn default_file_name(scope: Scope, today: NaiveDate) -> PathBuf {
    PathBuf::from(format!("cashflow-{scope}-{}.json", today.format("%Y-%m-%d")))
}

/// Writes `transactions` to `path` in the same format as the stored document.
pub async fn write(path: &Path, transactions: &[Transaction]) -> Res<()> {
    let document = snapshot::to_document(transactions)?;
    utils::write(path, document).await
}
