use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its subdirectories and an initial `config.json`.
///
/// # Arguments
/// - `cashflow_home` - The directory that will be the root of data directory, e.g.
///   `$HOME/cashflow`
/// - `repo` - The GitHub repository that holds the document, as `owner/name`
/// - `path` - The path of the document within the repository
/// - `branch` - The branch to read and write
///
/// The document itself is not touched. It is created by the first write.
///
/// # Errors
/// - Returns an error if `repo` is malformed or if any file operations fail.
pub async fn init(
    cashflow_home: &Path,
    repo: &str,
    path: Option<&str>,
    branch: Option<&str>,
) -> Result<Out<()>> {
    let config = Config::create(cashflow_home, repo, path, branch)
        .await
        .context("Unable to create the data directory and configs")
        .pub_result(ErrorType::Config)?;
    Ok(format!(
        "Successfully created the cashflow directory and config at {}. Next, run \
        'cashflow auth --token <TOKEN>'",
        config.root().display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("home");
        let out = init(&home, "me/money", Some("ledger.json"), None)
            .await
            .unwrap();
        assert!(out.message().contains("Successfully created"));

        let config = Config::load(&home).await.unwrap();
        assert_eq!(config.repo(), "me/money");
        assert_eq!(config.path(), "ledger.json");
    }

    #[tokio::test]
    async fn test_init_bad_repo() {
        let dir = TempDir::new().unwrap();
        let err = init(dir.path(), "money", None, None).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }
}
