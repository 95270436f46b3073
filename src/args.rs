//! These structs provide the CLI interface for the cashflow CLI.

use crate::export::Scope;
use crate::model::{Kind, NewTransaction};
use crate::view::{Filter, Grouping, Order, ViewOptions};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing::level_filters::LevelFilter;

/// cashflow: A command-line income and expense tracker that keeps its data in a GitHub repository.
///
/// Every transaction lives in a single JSON document in a repository you own. Each command loads
/// that document, does one thing, and writes it back only if nobody else changed it in the
/// meantime.
///
/// You will need a GitHub Personal Access Token with write access to the repository's contents.
/// Run `cashflow init` and then `cashflow auth --token <TOKEN>` to get started.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration file.
    ///
    /// This is the first command you should run. Decide which GitHub repository will hold your
    /// transactions and pass it as --repo. The document itself is created on the first write.
    Init(InitArgs),
    /// Save or verify the GitHub Personal Access Token.
    Auth(AuthArgs),
    /// Record an income or an expense.
    Add(AddArgs),
    /// Delete one transaction by the index shown in `cashflow list`.
    Delete(DeleteArgs),
    /// Delete every transaction.
    Clear(ClearArgs),
    /// List transactions grouped into periods, with totals.
    List(ViewArgs),
    /// Show only the totals, overall and per period.
    Summary(ViewArgs),
    /// Write transactions to a local JSON file.
    Export(ExportArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where cashflow configuration and backups are held. Defaults to ~/cashflow
    #[arg(long, env = "CASHFLOW_HOME", default_value_t = default_cashflow_home())]
    cashflow_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, cashflow_home: PathBuf) -> Self {
        Self {
            log_level,
            cashflow_home: cashflow_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn cashflow_home(&self) -> &DisplayPath {
        &self.cashflow_home
    }
}

/// (Not shown): Args for the `cashflow init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The GitHub repository that holds the document, as owner/name.
    #[arg(long)]
    repo: String,

    /// The path of the document within the repository. Defaults to data/transactions.json
    #[arg(long)]
    path: Option<String>,

    /// The branch to read and write. Defaults to the repository's default branch.
    #[arg(long)]
    branch: Option<String>,
}

impl InitArgs {
    pub fn new(repo: impl Into<String>, path: Option<String>, branch: Option<String>) -> Self {
        Self {
            repo: repo.into(),
            path,
            branch,
        }
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }
}

/// (Not shown): Args for the `cashflow auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    /// The Personal Access Token to save.
    #[arg(long, env = "CASHFLOW_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Check the saved token by loading the document once. Nothing is written.
    #[arg(long, conflicts_with = "token")]
    verify: bool,
}

impl AuthArgs {
    pub fn new(token: Option<String>, verify: bool) -> Self {
        Self { token, verify }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn verify(&self) -> bool {
        self.verify
    }
}

/// (Not shown): Args for the `cashflow add` command.
#[derive(Debug, Parser, Clone)]
pub struct AddArgs {
    /// The amount, a number greater than zero.
    #[arg(long, allow_hyphen_values = true)]
    amount: String,

    /// Whether the money came in or went out.
    #[arg(long = "type", value_enum)]
    kind: Kind,

    /// A free-text note.
    #[arg(long)]
    note: Option<String>,

    /// When it happened, e.g. 2024-01-10 or 2024-01-10T08:30:00Z. Defaults to now.
    #[arg(long)]
    date: Option<String>,
}

impl AddArgs {
    pub fn new(amount: impl Into<String>, kind: Kind) -> Self {
        Self {
            amount: amount.into(),
            kind,
            note: None,
            date: None,
        }
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    /// The unvalidated transaction these arguments describe.
    pub fn new_transaction(&self) -> NewTransaction {
        NewTransaction {
            amount: Some(self.amount.clone()),
            kind: Some(self.kind.to_string()),
            note: self.note.clone(),
            date: self.date.clone(),
        }
    }
}

/// (Not shown): Args for the `cashflow delete` command.
#[derive(Debug, Parser, Clone)]
pub struct DeleteArgs {
    /// The index shown in brackets by `cashflow list`.
    #[arg(long)]
    index: usize,

    /// The version printed by `cashflow list`. When given, the delete fails if the document has
    /// changed since then, because the index may now point at a different transaction.
    #[arg(long)]
    expect_version: Option<String>,
}

impl DeleteArgs {
    pub fn new(index: usize, expect_version: Option<String>) -> Self {
        Self {
            index,
            expect_version,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn expect_version(&self) -> Option<&str> {
        self.expect_version.as_deref()
    }
}

/// (Not shown): Args for the `cashflow clear` command.
#[derive(Debug, Parser, Clone)]
pub struct ClearArgs {
    /// Confirm that every transaction should be deleted.
    #[arg(long)]
    yes: bool,
}

impl ClearArgs {
    pub fn new(yes: bool) -> Self {
        Self { yes }
    }

    pub fn yes(&self) -> bool {
        self.yes
    }
}

/// Criteria that narrow down which transactions are shown or exported.
#[derive(Debug, Parser, Clone, Default)]
pub struct FilterArgs {
    /// Only transactions on or after this date (YYYY-MM-DD).
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Only transactions on or before this date (YYYY-MM-DD).
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Only transactions whose note contains this text (ignoring case) or whose amount contains
    /// these digits.
    #[arg(long)]
    search: Option<String>,
}

impl FilterArgs {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>, search: Option<String>) -> Self {
        Self { from, to, search }
    }

    pub fn filter(&self) -> Filter {
        Filter {
            from: self.from,
            to: self.to,
            search: self.search.clone(),
        }
    }
}

/// (Not shown): Args for the `cashflow list` and `cashflow summary` commands.
#[derive(Debug, Parser, Clone, Default)]
pub struct ViewArgs {
    /// How to group transactions into periods.
    #[arg(long, value_enum, default_value_t = Grouping::None)]
    group: Grouping,

    /// The window for `--group trailing`. Defaults to trailing_days from the config file.
    #[arg(long)]
    days: Option<u32>,

    /// The order of transactions within each period.
    #[arg(long, value_enum, default_value_t = Order::Inserted)]
    order: Order,

    #[clap(flatten)]
    filter: FilterArgs,
}

impl ViewArgs {
    pub fn new(group: Grouping, days: Option<u32>, order: Order, filter: FilterArgs) -> Self {
        Self {
            group,
            days,
            order,
            filter,
        }
    }

    pub fn group(&self) -> Grouping {
        self.group
    }

    pub fn days(&self) -> Option<u32> {
        self.days
    }

    /// Builds the view options, using `default_days` when `--days` was not given.
    pub fn options(&self, default_days: u32) -> ViewOptions {
        ViewOptions {
            grouping: self.group,
            days: self.days.unwrap_or(default_days),
            order: self.order,
            filter: self.filter.filter(),
        }
    }
}

/// (Not shown): Args for the `cashflow export` command.
#[derive(Debug, Parser, Clone)]
pub struct ExportArgs {
    /// Which transactions to export: all of them, only the --from/--to range, or the range and
    /// the --search.
    #[arg(long, value_enum, default_value_t = Scope::All)]
    scope: Scope,

    #[clap(flatten)]
    filter: FilterArgs,

    /// The file to write. Defaults to cashflow-{scope}-{date}.json in the current directory.
    #[arg(long)]
    out: Option<PathBuf>,
}

impl ExportArgs {
    pub fn new(scope: Scope, filter: FilterArgs, out: Option<PathBuf>) -> Self {
        Self { scope, filter, out }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn filter(&self) -> Filter {
        self.filter.filter()
    }

    pub fn out(&self) -> Option<&Path> {
        self.out.as_deref()
    }
}

fn default_cashflow_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("cashflow"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --cashflow-home or CASHFLOW_HOME instead of relying on the \
                default cashflow home directory. If you continue using the program right now, you \
                may have problems!",
            );
            PathBuf::from("cashflow")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
