use clap::Parser;
use cashflow_sync::args::{Args, Command};
use cashflow_sync::{commands, Mode, Result};
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, trace};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().cashflow_home().path();

    // This allows for testing the program without hitting GitHub. When
    // CASHFLOW_SYNC_IN_TEST_MODE is set and non-zero in length, then the mode will be Mode::Test,
    // otherwise it will be Mode::GitHub.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(
            home,
            init_args.repo(),
            init_args.path(),
            init_args.branch(),
        )
        .await?
        .print(),

        Command::Auth(auth_args) => {
            let config = commands::load_config(home).await?;
            if auth_args.verify() {
                commands::auth_verify(&config, mode).await?.print()
            } else {
                commands::auth(&config, auth_args.token()).await?.print()
            }
        }

        Command::Add(add_args) => {
            let config = commands::load_config(home).await?;
            commands::add(&config, mode, add_args.new_transaction())
                .await?
                .print()
        }

        Command::Delete(delete_args) => {
            let config = commands::load_config(home).await?;
            commands::delete(
                &config,
                mode,
                delete_args.index(),
                delete_args.expect_version(),
            )
            .await?
            .print()
        }

        Command::Clear(clear_args) => {
            let config = commands::load_config(home).await?;
            commands::clear(&config, mode, clear_args.yes())
                .await?
                .print()
        }

        Command::List(view_args) => {
            let config = commands::load_config(home).await?;
            commands::list(&config, mode, view_args).await?.print()
        }

        Command::Summary(view_args) => {
            let config = commands::load_config(home).await?;
            commands::summary(&config, mode, view_args).await?.print()
        }

        Command::Export(export_args) => {
            let config = commands::load_config(home).await?;
            commands::export(&config, mode, export_args).await?.print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for the library and binary only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
