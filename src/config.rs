//! Configuration file handling for cashflow.
//!
//! The configuration file is stored at `$CASHFLOW_HOME/config.json` and names the GitHub
//! repository and file path where the transactions document lives, along with backup and display
//! settings.

use crate::backup::Backup;
use crate::{utils, Res};
use anyhow::{bail, ensure, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const APP_NAME: &str = "cashflow";
const CONFIG_VERSION: u8 = 1;
const BACKUP_COPIES: u32 = 5;
const SECRETS: &str = ".secrets";
const BACKUPS: &str = ".backups";
const TOKEN: &str = "token";
const CONFIG_JSON: &str = "config.json";
const DEFAULT_PATH: &str = "data/transactions.json";
const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_COMMIT_MESSAGE: &str = "Update transactions.json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TRAILING_DAYS: u32 = 15;
const DEFAULT_CURRENCY: &str = "₱";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$CASHFLOW_HOME` and from there it loads `$CASHFLOW_HOME/config.json`.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    backups: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the data directory, its subdirectories and an initial `config.json`.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of the data directory, e.g. `$HOME/cashflow`
    /// - `repo` - The GitHub repository holding the document, as `owner/name`
    /// - `path` - The path of the document within the repository, defaults to
    ///   `data/transactions.json`
    /// - `branch` - The branch to read and write, defaults to the repository's default branch
    ///
    /// # Errors
    /// - Returns an error if `repo` is not `owner/name` or if any file operations fail.
    pub async fn create(
        dir: impl Into<PathBuf>,
        repo: &str,
        path: Option<&str>,
        branch: Option<&str>,
    ) -> Res<Self> {
        let (owner, name) = split_repo(repo)?;

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the cashflow home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let backups = root.join(BACKUPS);
        utils::make_dir(&backups).await?;
        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;

        let config_file = ConfigFile {
            repo: format!("{owner}/{name}"),
            path: path
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty()),
            branch: branch.map(str::to_string),
            ..ConfigFile::default()
        };
        let config_path = root.join(CONFIG_JSON);
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            backups,
            secrets,
            config_path,
            config_file,
        })
    }

    /// This will
    /// - validate that `cashflow_home` and its config file exist
    /// - load and validate the config file
    /// - validate that the backups and secrets directories exist
    pub async fn load(cashflow_home: impl Into<PathBuf>) -> Res<Self> {
        let maybe_relative = cashflow_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The cashflow home directory is missing, run 'cashflow init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let config = Self {
            root: root.clone(),
            backups: root.join(BACKUPS),
            secrets: root.join(SECRETS),
            config_path,
            config_file,
        };
        if !config.backups.is_dir() {
            bail!(
                "The backups directory is missing '{}'",
                config.backups.display()
            )
        }
        if !config.secrets.is_dir() {
            bail!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
        }
        debug!("Loaded config from {}", config.config_path.display());
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn backups(&self) -> &Path {
        &self.backups
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    /// The repository as `owner/name`.
    pub fn repo(&self) -> &str {
        &self.config_file.repo
    }

    pub fn owner(&self) -> &str {
        self.repo().split('/').next().unwrap_or_default()
    }

    pub fn repo_name(&self) -> &str {
        self.repo().split('/').nth(1).unwrap_or_default()
    }

    /// The path of the document within the repository.
    pub fn path(&self) -> &str {
        self.config_file.path.as_deref().unwrap_or(DEFAULT_PATH)
    }

    pub fn branch(&self) -> Option<&str> {
        self.config_file.branch.as_deref()
    }

    pub fn api_url(&self) -> &str {
        self.config_file.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    pub fn commit_message(&self) -> &str {
        self.config_file
            .commit_message
            .as_deref()
            .unwrap_or(DEFAULT_COMMIT_MESSAGE)
    }

    /// How long a single store request may take before it fails.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config_file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// The default window for the trailing-days grouping.
    pub fn trailing_days(&self) -> u32 {
        self.config_file
            .trailing_days
            .unwrap_or(DEFAULT_TRAILING_DAYS)
    }

    pub fn currency(&self) -> &str {
        self.config_file
            .currency
            .as_deref()
            .unwrap_or(DEFAULT_CURRENCY)
    }

    pub fn backup_copies(&self) -> u32 {
        self.config_file.backup_copies
    }

    /// Creates a new `Backup` instance for managing backup files.
    pub fn backup(&self) -> Backup {
        Backup::new(self)
    }

    /// Returns the stored `token_path` if it is absolute, otherwise resolves the relative path.
    pub fn token_path(&self) -> PathBuf {
        let p = self.config_file.token_path();
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }

    /// Reads the Personal Access Token saved by `cashflow auth`.
    pub async fn token(&self) -> Res<String> {
        let path = self.token_path();
        let token = utils::read(&path)
            .await
            .context("No token has been saved, run 'cashflow auth --token <TOKEN>'")?;
        let token = token.trim().to_string();
        ensure!(
            !token.is_empty(),
            "The token file '{}' is empty, run 'cashflow auth --token <TOKEN>'",
            path.display()
        );
        Ok(token)
    }

    /// Saves the token with permissions restricted to the current user.
    pub async fn save_token(&self, token: &str) -> Res<()> {
        let token = token.trim();
        ensure!(!token.is_empty(), "The token cannot be empty");
        let path = self.token_path();
        utils::write(&path, token).await?;
        utils::restrict_permissions(&path)?;
        debug!("Token saved to {}", path.display());
        Ok(())
    }

    /// Removes the saved token, e.g. after the store rejected it.
    pub async fn forget_token(&self) -> Res<()> {
        let path = self.token_path();
        if path.is_file() {
            utils::remove_file(&path).await?;
        }
        Ok(())
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "cashflow",
///   "config_version": 1,
///   "repo": "mykael25/cashflow-tracker",
///   "path": "data/transactions.json",
///   "backup_copies": 5
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "cashflow"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// The GitHub repository as `owner/name`
    repo: String,

    /// Path of the JSON document within the repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,

    /// Branch to read and write, the repository default if not specified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    branch: Option<String>,

    /// Base URL of the GitHub REST API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_url: Option<String>,

    /// Commit message used for every write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    commit_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    trailing_days: Option<u32>,

    /// Currency symbol used when printing amounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    currency: Option<String>,

    /// Number of backup copies to keep
    #[serde(default = "default_backup_copies")]
    backup_copies: u32,

    /// Path to the token file (optional, relative to config.json or absolute)
    /// Defaults to $CASHFLOW_HOME/.secrets/token if not specified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,
}

fn default_backup_copies() -> u32 {
    BACKUP_COPIES
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            repo: String::new(),
            path: None,
            branch: None,
            api_url: None,
            commit_message: None,
            timeout_secs: None,
            trailing_days: None,
            currency: None,
            backup_copies: BACKUP_COPIES,
            token_path: None,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if it fails validation.
    pub async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        split_repo(&config.repo)
            .with_context(|| format!("Invalid repo in config file at {}", path.display()))?;
        ensure!(
            config.timeout_secs != Some(0),
            "timeout_secs must be greater than zero"
        );

        Ok(config)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    /// If None, defaults to $CASHFLOW_HOME/.secrets/token
    pub fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(TOKEN))
    }
}

/// Splits `owner/name` into its two parts.
fn split_repo(repo: &str) -> Res<(&str, &str)> {
    let mut parts = repo.trim().split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
            Ok((owner, name))
        }
        _ => bail!("Expected the repository as 'owner/name', got '{repo}'"),
    }
}
