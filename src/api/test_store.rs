//! Implements the `Store` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using GitHub. State is process-global and keyed by `repo:path`, so
//! two `TestStore` objects for the same config behave like two sessions sharing one remote.

use crate::api::Store;
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{snapshot, Snapshot, Transaction, VersionTag};
use crate::{Config, Result};
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

static STATES: LazyLock<Mutex<HashMap<String, TestStoreState>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// The remote side of a `TestStore`.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TestStoreState {
    /// The base64 payload exactly as it would be transported, `None` if the document does not
    /// exist.
    pub payload: Option<String>,
    pub version: Option<VersionTag>,
    /// When set, any other token is rejected with an auth error.
    pub accepted_token: Option<String>,
    /// Number of `load` calls received.
    pub loads: usize,
    /// Number of `replace` calls received, successful or not.
    pub writes: usize,
}

impl TestStoreState {
    /// A state holding `transactions` at a fresh version.
    pub fn with_transactions(transactions: &[Transaction]) -> Result<Self> {
        Ok(Self {
            payload: Some(snapshot::encode(transactions).pub_result(ErrorType::Transport)?),
            version: Some(new_version()),
            ..Self::default()
        })
    }

    /// Decodes the stored payload.
    pub fn transactions(&self) -> Result<Vec<Transaction>> {
        match &self.payload {
            Some(payload) => snapshot::decode(payload).pub_result(ErrorType::Transport),
            None => Ok(Vec::new()),
        }
    }
}

/// An implementation of the `Store` trait that does not use GitHub.
pub struct TestStore {
    key: String,
    token: String,
}

impl TestStore {
    pub fn new(config: &Config, token: impl Into<String>) -> Self {
        Self {
            key: store_key(config),
            token: token.into(),
        }
    }

    pub fn get_state(&self) -> TestStoreState {
        lock().get(&self.key).cloned().unwrap_or_default()
    }

    pub fn set_state(&self, state: TestStoreState) {
        lock().insert(self.key.clone(), state);
    }

    fn check_token(&self, state: &TestStoreState) -> Result<()> {
        match &state.accepted_token {
            Some(accepted) if *accepted != self.token => {
                Err(Error::msg(ErrorType::Auth, "Bad credentials"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl Store for TestStore {
    async fn load(&mut self) -> Result<Snapshot> {
        let mut states = lock();
        let state = states.entry(self.key.clone()).or_default();
        state.loads += 1;
        self.check_token(state)?;
        match &state.payload {
            Some(payload) => {
                let transactions = snapshot::decode(payload).pub_result(ErrorType::Transport)?;
                Ok(Snapshot::new(transactions, state.version.clone()))
            }
            None => Ok(Snapshot::new(Vec::new(), None)),
        }
    }

    async fn replace(
        &mut self,
        transactions: &[Transaction],
        expected: Option<&VersionTag>,
    ) -> Result<VersionTag> {
        let mut states = lock();
        let state = states.entry(self.key.clone()).or_default();
        state.writes += 1;
        self.check_token(state)?;
        if state.version.as_ref() != expected {
            return Err(Error::msg(
                ErrorType::Conflict,
                format!(
                    "Version mismatch: stored {}, expected {}",
                    state.version.as_ref().map(VersionTag::as_str).unwrap_or("<none>"),
                    expected.map(VersionTag::as_str).unwrap_or("<none>")
                ),
            ));
        }
        let payload = snapshot::encode(transactions).pub_result(ErrorType::Transport)?;
        let version = new_version();
        debug!("Test store {} now at version {version}", self.key);
        state.payload = Some(payload);
        state.version = Some(version.clone());
        Ok(version)
    }
}

fn store_key(config: &Config) -> String {
    format!("{}:{}", config.repo(), config.path())
}

fn new_version() -> VersionTag {
    VersionTag::new(Uuid::new_v4().simple().to_string())
}

fn lock() -> MutexGuard<'static, HashMap<String, TestStoreState>> {
    // A test that panicked while holding the lock cannot leave the map half-written.
    STATES.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewTransaction;
    use crate::test::TestEnv;

    fn txn(amount: &str) -> Transaction {
        NewTransaction::new(amount, "income")
            .date("2024-01-10")
            .validate()
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_missing_document() {
        let env = TestEnv::new().await;
        let mut store = env.store();
        let snapshot = store.load().await.unwrap();
        assert!(snapshot.is_empty());
        assert!(snapshot.version().is_none());
    }

    #[tokio::test]
    async fn test_create_then_replace() {
        let env = TestEnv::new().await;
        let mut store = env.store();

        let v1 = store.replace(&[txn("1")], None).await.unwrap();
        let v2 = store.replace(&[txn("1"), txn("2")], Some(&v1)).await.unwrap();
        assert_ne!(v1, v2);

        let snapshot = store.load().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.version(), Some(&v2));
    }

    #[tokio::test]
    async fn test_replace_with_stale_version_conflicts() {
        let env = TestEnv::new().await;
        let mut a = env.store();
        let mut b = env.store();

        let v0 = a.replace(&[txn("1")], None).await.unwrap();
        let t0 = a.load().await.unwrap();
        let t0_b = b.load().await.unwrap();
        assert_eq!(t0.version(), Some(&v0));
        assert_eq!(t0_b.version(), Some(&v0));

        a.replace(&[txn("5")], Some(&v0)).await.unwrap();
        let err = b.replace(&[txn("9")], Some(&v0)).await.unwrap_err();
        assert!(err.is_conflict());

        // The losing write changed nothing.
        let stored = a.get_state().transactions().unwrap();
        assert_eq!(stored, vec![txn("5")]);
    }

    #[tokio::test]
    async fn test_create_when_document_exists_conflicts() {
        let env = TestEnv::new().await;
        let mut store = env.store();
        store.replace(&[txn("1")], None).await.unwrap();
        let err = store.replace(&[txn("2")], None).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_rejected_token() {
        let env = TestEnv::new().await;
        let store = env.store();
        store.set_state(TestStoreState {
            accepted_token: Some("other".to_string()),
            ..TestStoreState::default()
        });
        let mut store = env.store();
        assert!(store.load().await.unwrap_err().is_auth());
        assert!(store.replace(&[], None).await.unwrap_err().is_auth());
        assert_eq!(store.get_state().loads, 1);
        assert_eq!(store.get_state().writes, 1);
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_transport() {
        let env = TestEnv::new().await;
        let mut store = env.store();
        store.set_state(TestStoreState {
            payload: Some("%%%".to_string()),
            version: Some(VersionTag::new("v")),
            ..TestStoreState::default()
        });
        assert!(store.load().await.unwrap_err().is_transport());
    }
}
