//! The session context: one store, the last-loaded snapshot, and the mutations over it.
//!
//! Every mutation is a read-modify-write of the whole document. The change is applied to a copy
//! of the loaded sequence, sent with the loaded version tag, and only becomes the session's
//! snapshot once the store accepts it.

use crate::api::Store;
use crate::backup::{Backup, PRE_CLEAR, PRE_DELETE};
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{NewTransaction, Snapshot, Transaction, VersionTag};
use crate::view::{self, View, ViewOptions};
use crate::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Holds the store and the last snapshot loaded from it. Operations take `&mut self`, so a
/// session runs one operation at a time.
pub struct Session {
    store: Box<dyn Store + Send>,
    backup: Option<Backup>,
    snapshot: Option<Snapshot>,
}

impl Session {
    pub fn new(store: Box<dyn Store + Send>) -> Self {
        Self {
            store,
            backup: None,
            snapshot: None,
        }
    }

    /// Saves a local backup of the document before each delete or clear.
    pub fn with_backup(mut self, backup: Backup) -> Self {
        self.backup = Some(backup);
        self
    }

    /// The last-loaded snapshot, `None` before the first load and after `reset`.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// The loaded transactions, empty when nothing is loaded.
    pub fn transactions(&self) -> &[Transaction] {
        self.snapshot
            .as_ref()
            .map(Snapshot::transactions)
            .unwrap_or_default()
    }

    /// Discards the loaded snapshot. The next operation loads again.
    pub fn reset(&mut self) {
        debug!("Resetting the session");
        self.snapshot = None;
    }

    /// Fetches the current snapshot from the store, replacing whatever was loaded.
    pub async fn load(&mut self) -> Result<&Snapshot> {
        let loaded = self.store.load().await;
        let snapshot = self.check(loaded)?;
        debug!(
            "Loaded {} transactions at version {}",
            snapshot.len(),
            version_text(snapshot.version())
        );
        Ok(self.snapshot.insert(snapshot))
    }

    /// Validates `input` and appends it to the end of the sequence. Invalid input fails with
    /// `ErrorType::Validation` before the store is contacted.
    pub async fn add(&mut self, input: NewTransaction) -> Result<Transaction> {
        let transaction = input.validate()?;
        self.add_transaction(transaction).await
    }

    /// Appends an already validated transaction to the end of the sequence.
    pub async fn add_transaction(&mut self, transaction: Transaction) -> Result<Transaction> {
        let current = self.current().await?;
        let (mut transactions, version) = current.into_parts();
        transactions.push(transaction.clone());
        self.commit(transactions, version).await?;
        debug!(
            "Added {} of {}",
            transaction.kind(),
            transaction.amount().text()
        );
        Ok(transaction)
    }

    /// Removes the record at `index` in the full loaded sequence and returns it.
    pub async fn delete_at(&mut self, index: usize) -> Result<Transaction> {
        let current = self.current().await?;
        self.delete_from(current, index).await
    }

    /// Like `delete_at`, but fails with `ErrorType::Conflict` without writing if the freshly
    /// loaded version is not `expected`. Use this when `index` was read from an earlier listing.
    pub async fn delete_at_version(
        &mut self,
        index: usize,
        expected: &VersionTag,
    ) -> Result<Transaction> {
        let current = self.load().await?.clone();
        if current.version() != Some(expected) {
            return Err(Error::msg(
                ErrorType::Conflict,
                format!(
                    "The document changed since version {expected} (now {}), list it again \
                    before deleting",
                    version_text(current.version())
                ),
            ));
        }
        self.delete_from(current, index).await
    }

    /// Replaces the sequence with an empty one and returns how many records were removed. Does
    /// not write when the sequence is already empty.
    pub async fn clear(&mut self) -> Result<usize> {
        let current = self.current().await?;
        if current.is_empty() {
            debug!("Nothing to clear");
            return Ok(0);
        }
        self.save_backup(PRE_CLEAR, &current).await?;
        let removed = current.len();
        let (_, version) = current.into_parts();
        self.commit(Vec::new(), version).await?;
        debug!("Cleared {removed} transactions");
        Ok(removed)
    }

    /// Derives a view of the loaded snapshot, loading it first if needed.
    pub async fn view(&mut self, options: &ViewOptions, now: DateTime<Utc>) -> Result<View> {
        if self.snapshot.is_none() {
            self.load().await?;
        }
        Ok(view::build(self.transactions(), options, now))
    }

    async fn delete_from(&mut self, current: Snapshot, index: usize) -> Result<Transaction> {
        if index >= current.len() {
            return Err(Error::msg(
                ErrorType::Validation,
                format!(
                    "Index {index} is out of range, there are {} transactions",
                    current.len()
                ),
            ));
        }
        self.save_backup(PRE_DELETE, &current).await?;
        let (mut transactions, version) = current.into_parts();
        let removed = transactions.remove(index);
        self.commit(transactions, version).await?;
        debug!("Deleted transaction {index}");
        Ok(removed)
    }

    /// A copy of the loaded snapshot, loading it first if needed.
    async fn current(&mut self) -> Result<Snapshot> {
        match &self.snapshot {
            Some(snapshot) => Ok(snapshot.clone()),
            None => Ok(self.load().await?.clone()),
        }
    }

    async fn commit(
        &mut self,
        transactions: Vec<Transaction>,
        expected: Option<VersionTag>,
    ) -> Result<()> {
        let replaced = self.store.replace(&transactions, expected.as_ref()).await;
        let version = self.check(replaced)?;
        debug!(
            "Stored {} transactions, version {} -> {version}",
            transactions.len(),
            version_text(expected.as_ref())
        );
        self.snapshot = Some(Snapshot::new(transactions, Some(version)));
        Ok(())
    }

    async fn save_backup(&self, prefix: &str, snapshot: &Snapshot) -> Result<()> {
        if let Some(backup) = &self.backup {
            let path = backup
                .save_json(prefix, snapshot)
                .await
                .pub_result(ErrorType::Io)?;
            debug!("Saved backup to {}", path.display());
        }
        Ok(())
    }

    /// Rejected credentials end the session's view of the document.
    fn check<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_auth() {
                warn!("The store rejected the credentials");
                self.reset();
            }
        }
        result
    }
}

fn version_text(version: Option<&VersionTag>) -> &str {
    version.map(VersionTag::as_str).unwrap_or("<none>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestStoreState;
    use crate::test::TestEnv;
    use crate::view::{Grouping, Totals};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use rust_decimal::Decimal;

    fn txn(amount: &str, kind: &str, note: &str, date: &str) -> Transaction {
        NewTransaction::new(amount, kind)
            .note(note)
            .date(date)
            .validate()
            .unwrap()
    }

    fn seed(env: &TestEnv, transactions: &[Transaction]) {
        env.store()
            .set_state(TestStoreState::with_transactions(transactions).unwrap());
    }

    fn three() -> Vec<Transaction> {
        vec![
            txn("1", "income", "a", "2024-01-01"),
            txn("2", "expense", "b", "2024-01-02"),
            txn("3", "income", "c", "2024-01-03"),
        ]
    }

    #[tokio::test]
    async fn test_add_appends_to_end() {
        let env = TestEnv::new().await;
        seed(&env, &three());
        let mut session = env.session();

        let added = session
            .add(NewTransaction::new("7.25", "expense").note("tea").date("2024-02-01"))
            .await
            .unwrap();

        let mut fresh = env.session();
        let loaded = fresh.load().await.unwrap();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded.transactions().last(), Some(&added));
        assert_eq!(&loaded.transactions()[..3], &three()[..]);
        assert_eq!(session.snapshot().unwrap().version(), loaded.version());
    }

    #[tokio::test]
    async fn test_add_keeps_full_precision() {
        let env = TestEnv::new().await;
        let mut session = env.session();
        for amount in ["12345678901234567.89", "79228162514264337593543950335"] {
            let err = session
                .add(NewTransaction::new(amount, "income"))
                .await
                .unwrap_err();
            assert!(err.is_validation(), "{amount}");
        }
        assert_eq!(env.store().get_state().writes, 0);

        let added = session
            .add(NewTransaction::new("1234567.89", "income").date("2024-01-10"))
            .await
            .unwrap();

        let mut fresh = env.session();
        let loaded = fresh.load().await.unwrap();
        assert_eq!(loaded.transactions(), &[added][..]);
        assert_eq!(
            loaded.transactions()[0].amount().value(),
            Decimal::new(123456789, 2)
        );
    }

    #[tokio::test]
    async fn test_add_keeps_malformed_stored_amount() {
        let env = TestEnv::new().await;
        let document = r#"[{"amount":"abc","type":"income","note":"","date":"2024-01-01"}]"#;
        env.store().set_state(TestStoreState {
            payload: Some(STANDARD.encode(document)),
            version: Some(VersionTag::new("seeded")),
            ..TestStoreState::default()
        });
        let mut session = env.session();
        session
            .add(NewTransaction::new("5", "expense").date("2024-01-02"))
            .await
            .unwrap();

        let state = env.store().get_state();
        let payload = state.payload.clone().unwrap();
        let written = String::from_utf8(STANDARD.decode(payload).unwrap()).unwrap();
        assert!(written.contains(r#""amount": "abc""#), "{written}");

        let stored = state.transactions().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(Totals::of(&stored).balance, Decimal::from(-5));
    }

    #[tokio::test]
    async fn test_add_creates_document() {
        let env = TestEnv::new().await;
        let mut session = env.session();
        session
            .add(NewTransaction::new("100", "income").date("2024-01-10"))
            .await
            .unwrap();
        let state = env.store().get_state();
        assert!(state.version.is_some());
        assert_eq!(state.transactions().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_zero_makes_no_store_call() {
        let env = TestEnv::new().await;
        let mut session = env.session();
        let err = session
            .add(NewTransaction::new("0", "income"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        let state = env.store().get_state();
        assert_eq!(state.loads, 0);
        assert_eq!(state.writes, 0);
    }

    #[tokio::test]
    async fn test_delete_preserves_order() {
        let env = TestEnv::new().await;
        seed(&env, &three());
        let mut session = env.session();
        session.load().await.unwrap();

        let removed = session.delete_at(1).await.unwrap();
        assert_eq!(removed.note(), "b");

        let stored = env.store().get_state().transactions().unwrap();
        let notes: Vec<&str> = stored.iter().map(Transaction::note).collect();
        assert_eq!(notes, vec!["a", "c"]);
        assert_eq!(session.transactions(), &stored[..]);
    }

    #[tokio::test]
    async fn test_delete_out_of_range() {
        let env = TestEnv::new().await;
        seed(&env, &three());
        let mut session = env.session();
        let err = session.delete_at(3).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(env.store().get_state().writes, 0);
        assert_eq!(session.transactions().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_at_version_detects_change() {
        let env = TestEnv::new().await;
        seed(&env, &three());
        let listed = env.store().get_state().version.unwrap();

        // Someone else adds a record after the listing.
        let mut other = env.session();
        other
            .add(NewTransaction::new("9", "income").date("2024-01-04"))
            .await
            .unwrap();

        let mut session = env.session();
        let err = session.delete_at_version(0, &listed).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(env.store().get_state().transactions().unwrap().len(), 4);

        let current = env.store().get_state().version.unwrap();
        session.delete_at_version(0, &current).await.unwrap();
        assert_eq!(env.store().get_state().transactions().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_and_clear_take_backups() {
        let env = TestEnv::new().await;
        seed(&env, &three());
        let mut session = env.session().with_backup(env.config().backup());
        session.delete_at(0).await.unwrap();
        session.clear().await.unwrap();

        let mut names: Vec<String> = std::fs::read_dir(env.config().backups())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("pre-clear."));
        assert!(names[1].starts_with("pre-delete."));

        let content = std::fs::read_to_string(env.config().backups().join(&names[1])).unwrap();
        assert!(content.contains("\"note\": \"a\""));
    }

    #[tokio::test]
    async fn test_clear_then_load_is_empty() {
        let env = TestEnv::new().await;
        seed(&env, &three());
        let mut session = env.session();
        assert_eq!(session.clear().await.unwrap(), 3);

        let mut fresh = env.session();
        assert!(fresh.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_empty_does_not_write() {
        let env = TestEnv::new().await;
        let mut session = env.session();
        assert_eq!(session.clear().await.unwrap(), 0);
        assert_eq!(env.store().get_state().writes, 0);
    }

    #[tokio::test]
    async fn test_two_sessions_conflict() {
        let env = TestEnv::new().await;
        seed(&env, &three());
        let mut a = env.session();
        let mut b = env.session();
        let t0 = a.load().await.unwrap().version().cloned();
        assert_eq!(b.load().await.unwrap().version().cloned(), t0);

        a.add(NewTransaction::new("5", "income")).await.unwrap();
        let err = b.add(NewTransaction::new("6", "income")).await.unwrap_err();
        assert!(err.is_conflict());

        // The loser keeps its old snapshot until it reloads.
        assert_eq!(b.snapshot().unwrap().version().cloned(), t0);
        assert_eq!(b.transactions().len(), 3);

        b.load().await.unwrap();
        b.add(NewTransaction::new("6", "income")).await.unwrap();
        assert_eq!(env.store().get_state().transactions().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_auth_error_resets_session() {
        let env = TestEnv::new().await;
        seed(&env, &three());
        let mut session = env.session();
        session.load().await.unwrap();
        assert!(session.snapshot().is_some());

        let mut state = env.store().get_state();
        state.accepted_token = Some("someone-else".to_string());
        env.store().set_state(state);

        let err = session
            .add(NewTransaction::new("1", "income"))
            .await
            .unwrap_err();
        assert!(err.is_auth());
        assert!(session.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_view_loads_when_needed() {
        let env = TestEnv::new().await;
        seed(&env, &three());
        let mut session = env.session();
        let options = ViewOptions {
            grouping: Grouping::Month,
            ..ViewOptions::default()
        };
        let view = session.view(&options, Utc::now()).await.unwrap();
        assert_eq!(view.buckets.len(), 1);
        assert_eq!(view.buckets[0].label, "2024-01");
        assert_eq!(view.overall.balance.to_string(), "2");
        assert_eq!(env.store().get_state().loads, 1);
    }
}
