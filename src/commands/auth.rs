//! Token command handlers.
//!
//! This module implements the CLI commands for:
//! - `cashflow auth --token <TOKEN>` - Save the Personal Access Token
//! - `cashflow auth --verify` - Check the saved token against the store

use crate::api::Mode;
use crate::commands::{forget_rejected_token, open_session, Out};
use crate::error::{Error, ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;

/// Handles `cashflow auth --token <TOKEN>`. Saves the token to `token_path` with permissions
/// restricted to the current user. The token is not checked, use `cashflow auth --verify` for
/// that.
pub async fn auth(config: &Config, token: Option<&str>) -> Result<Out<()>> {
    let token = token.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
        Error::msg(
            ErrorType::Validation,
            "Provide the token with --token or the CASHFLOW_TOKEN environment variable",
        )
    })?;
    config
        .save_token(token)
        .await
        .context("Unable to save the token")
        .pub_result(ErrorType::Io)?;
    Ok(format!("Saved the token to {}", config.token_path().display()).into())
}

/// Handles `cashflow auth --verify`. Loads the document once and never writes.
///
/// If the store rejects the token, the token is removed and the user must run
/// `cashflow auth --token <TOKEN>` again.
pub async fn auth_verify(config: &Config, mode: Mode) -> Result<Out<()>> {
    let mut session = open_session(config, mode).await?;
    let loaded = session.load().await.map(|snapshot| snapshot.len());
    let count = forget_rejected_token(config, loaded).await?;
    Ok(format!(
        "Your token is valid! {}/{} holds {}",
        config.repo(),
        config.path(),
        super::count_of(count, "transaction")
    )
    .into())
}
