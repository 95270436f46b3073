//! Command handlers for the cashflow CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod add;
mod auth;
mod delete;
mod export;
mod init;
mod list;

use crate::api::{self, Mode};
use crate::error::{ErrorType, IntoResult};
use crate::session::Session;
use crate::{Config, Result};
use serde::Serialize;
use std::fmt::Debug;
use std::path::Path;
use tracing::{debug, info, warn};

pub use add::add;
pub use auth::{auth, auth_verify};
pub use delete::{clear, delete};
pub use export::{export, Exported};
pub use init::init;
pub use list::{list, summary};

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// Loads `$CASHFLOW_HOME/config.json`.
pub async fn load_config(cashflow_home: &Path) -> Result<Config> {
    Config::load(cashflow_home)
        .await
        .pub_result(ErrorType::Config)
}

/// Opens a session on the configured store using the saved token. Deletes and clears will be
/// backed up to `$CASHFLOW_HOME/.backups`.
async fn open_session(config: &Config, mode: Mode) -> Result<Session> {
    let token = config.token().await.pub_result(ErrorType::Config)?;
    debug!("Opening a {mode} session for {}/{}", config.repo(), config.path());
    let store = api::store(config, token, mode)?;
    Ok(Session::new(store).with_backup(config.backup()))
}

/// When the store rejected the token, deletes it so that the next command asks for a new one.
async fn forget_rejected_token<T>(config: &Config, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        if e.is_auth() {
            warn!(
                "The saved token was rejected and has been removed, run \
                'cashflow auth --token <TOKEN>'"
            );
            if let Err(forget) = config.forget_token().await {
                warn!("Unable to remove the rejected token: {forget:#}");
            }
        }
    }
    result
}

/// Pluralizes `noun` with a trailing `s` when `count` is not one.
fn count_of(count: usize, noun: &str) -> String {
    format!("{count} {noun}{}", if count == 1 { "" } else { "s" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestStoreState;
    use crate::test::TestEnv;

    #[test]
    fn test_count_of() {
        assert_eq!(count_of(1, "transaction"), "1 transaction");
        assert_eq!(count_of(0, "transaction"), "0 transactions");
        assert_eq!(count_of(2, "transaction"), "2 transactions");
    }

    #[tokio::test]
    async fn test_open_session_without_token() {
        let env = TestEnv::new().await;
        env.config().forget_token().await.unwrap();
        let err = open_session(&env.config(), Mode::Test).await.err().unwrap();
        assert_eq!(err.error_type(), ErrorType::Config);
    }

    #[tokio::test]
    async fn test_rejected_token_is_forgotten() {
        let env = TestEnv::new().await;
        env.store().set_state(TestStoreState {
            accepted_token: Some("another".to_string()),
            ..TestStoreState::default()
        });
        let config = env.config();
        let mut session = open_session(&config, Mode::Test).await.unwrap();
        let result = session.load().await.map(|_| ());
        let err = forget_rejected_token(&config, result).await.unwrap_err();
        assert!(err.is_auth());
        assert!(config.token().await.is_err());
    }
}
