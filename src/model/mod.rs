//! Types that represent the core data model, such as `Transaction` and `Snapshot`.
mod amount;
mod date;
pub(crate) mod snapshot;
mod transaction;

pub use amount::{Amount, AmountError};
pub use date::TxnDate;
pub use snapshot::{Snapshot, VersionTag};
pub use transaction::{Kind, NewTransaction, Transaction};
