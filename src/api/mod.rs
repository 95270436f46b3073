//! The transaction store: durable, versioned storage of the whole transaction sequence.
//!
//! The `Store` trait is the seam between the session and the remote object store. `GitHubStore`
//! talks to the GitHub Contents API. `TestStore` keeps everything in memory so that the whole app
//! can run, top-to-bottom, without touching GitHub.

mod github;
mod test_store;

use crate::model::{Snapshot, Transaction, VersionTag};
use crate::{Config, Result};
use std::fmt::{Display, Formatter};

pub(crate) use github::GitHubStore;
pub use test_store::{TestStore, TestStoreState};

/// When this environment variable is set and non-empty, `Mode::from_env` returns `Mode::Test`.
pub const TEST_MODE_ENV: &str = "CASHFLOW_SYNC_IN_TEST_MODE";

/// Read-with-version and conditional-write-with-version over a single document.
///
/// Every call is a single request: no retries, no backoff. Failures carry one of
/// `ErrorType::Auth`, `ErrorType::Conflict` or `ErrorType::Transport`.
#[async_trait::async_trait]
pub trait Store {
    /// Fetches the current sequence and its version tag. A document that does not exist yet
    /// yields an empty sequence and no tag.
    async fn load(&mut self) -> Result<Snapshot>;

    /// Replaces the whole stored sequence, provided the stored version still matches `expected`.
    /// `expected` is `None` only when creating the document. Returns the new version tag.
    async fn replace(
        &mut self,
        transactions: &[Transaction],
        expected: Option<&VersionTag>,
    ) -> Result<VersionTag>;
}

/// Which `Store` implementation to use.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    #[default]
    GitHub,
    Test,
}

impl Mode {
    /// Returns `Mode::Test` when `CASHFLOW_SYNC_IN_TEST_MODE` is set and non-empty.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(v) if !v.is_empty() => Mode::Test,
            _ => Mode::GitHub,
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::GitHub => f.write_str("github"),
            Mode::Test => f.write_str("test"),
        }
    }
}

/// Creates the `Store` for `mode`, authenticated with `token`.
pub fn store(config: &Config, token: String, mode: Mode) -> Result<Box<dyn Store + Send>> {
    Ok(match mode {
        Mode::GitHub => Box::new(GitHubStore::new(config, token)?),
        Mode::Test => Box::new(TestStore::new(config, token)),
    })
}
