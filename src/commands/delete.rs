//! Delete command handlers.

use crate::api::Mode;
use crate::commands::{count_of, forget_rejected_token, open_session, Out};
use crate::error::{Error, ErrorType};
use crate::model::{Transaction, VersionTag};
use crate::{Config, Result};

/// Deletes the transaction at `index`, the bracketed number shown by `cashflow list`.
///
/// Indices refer to the full stored sequence, not to a filtered or grouped listing. When
/// `expect_version` is given, the delete fails with a conflict if the document is no longer at
/// that version, since the index may now point at a different transaction.
pub async fn delete(
    config: &Config,
    mode: Mode,
    index: usize,
    expect_version: Option<&str>,
) -> Result<Out<Transaction>> {
    let mut session = open_session(config, mode).await?;
    let deleted = match expect_version {
        Some(version) => {
            session
                .delete_at_version(index, &VersionTag::new(version))
                .await
        }
        None => session.delete_at(index).await,
    };
    let deleted = forget_rejected_token(config, deleted).await?;
    let message = format!(
        "Deleted transaction {index}: {} {} on {}",
        deleted.kind(),
        deleted.amount().with_symbol(config.currency()),
        deleted.date().day()
    );
    Ok(Out::new(message, deleted))
}

/// Deletes every transaction. Refuses to do anything unless `yes` is true.
pub async fn clear(config: &Config, mode: Mode, yes: bool) -> Result<Out<usize>> {
    if !yes {
        return Err(Error::msg(
            ErrorType::Validation,
            "This deletes every transaction, pass --yes to confirm",
        ));
    }
    let mut session = open_session(config, mode).await?;
    let cleared = session.clear().await;
    let count = forget_rejected_token(config, cleared).await?;
    let message = if count == 0 {
        "There were no transactions to clear".to_string()
    } else {
        format!("Cleared {}", count_of(count, "transaction"))
    };
    Ok(Out::new(message, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestStoreState;
    use crate::model::NewTransaction;
    use crate::test::TestEnv;

    fn seed(env: &TestEnv) -> VersionTag {
        let transactions: Vec<Transaction> = ["10", "20", "30"]
            .iter()
            .map(|a| {
                NewTransaction::new(*a, "expense")
                    .date("2024-05-01")
                    .validate()
                    .unwrap()
            })
            .collect();
        let state = TestStoreState::with_transactions(&transactions).unwrap();
        let version = state.version.clone().unwrap();
        env.store().set_state(state);
        version
    }

    #[tokio::test]
    async fn test_delete() {
        let env = TestEnv::new().await;
        seed(&env);
        let out = delete(&env.config(), Mode::Test, 1, None).await.unwrap();
        assert_eq!(
            out.message(),
            "Deleted transaction 1: expense ₱20.00 on 2024-05-01"
        );
        let amounts: Vec<String> = env
            .store()
            .get_state()
            .transactions()
            .unwrap()
            .iter()
            .map(|t| t.amount().text())
            .collect();
        assert_eq!(amounts, vec!["10", "30"]);
    }

    #[tokio::test]
    async fn test_delete_with_expected_version() {
        let env = TestEnv::new().await;
        let version = seed(&env);
        let err = delete(&env.config(), Mode::Test, 0, Some("stale"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(env.store().get_state().writes, 0);

        delete(&env.config(), Mode::Test, 0, Some(version.as_str()))
            .await
            .unwrap();
        assert_eq!(env.store().get_state().transactions().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_out_of_range() {
        let env = TestEnv::new().await;
        seed(&env);
        let err = delete(&env.config(), Mode::Test, 7, None)
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_clear_requires_yes() {
        let env = TestEnv::new().await;
        seed(&env);
        let err = clear(&env.config(), Mode::Test, false).await.unwrap_err();
        assert!(err.is_validation());
        let state = env.store().get_state();
        assert_eq!(state.loads + state.writes, 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let env = TestEnv::new().await;
        seed(&env);
        let out = clear(&env.config(), Mode::Test, true).await.unwrap();
        assert_eq!(out.message(), "Cleared 3 transactions");
        assert!(env.store().get_state().transactions().unwrap().is_empty());

        let out = clear(&env.config(), Mode::Test, true).await.unwrap();
        assert_eq!(out.structure(), Some(&0));
    }
}
