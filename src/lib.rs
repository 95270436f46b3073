//! cashflow-sync: an income and expense tracker whose data lives in a single JSON document in a
//! GitHub repository.
//!
//! The pieces are:
//! - `api`: the `Store` trait and its GitHub and in-memory implementations
//! - `session`: the loaded snapshot and the add, delete and clear mutations over it
//! - `view`: filtering, grouping and totals
//! - `commands`: one handler per CLI subcommand

pub mod api;
pub mod args;
mod backup;
pub mod commands;
mod config;
mod error;
pub mod export;
pub mod model;
pub mod render;
pub mod session;
mod utils;
pub mod view;


pub use api::Mode;
pub use backup::Backup;
pub use config::Config;
pub use error::{Error, ErrorType, Result};

pub(crate) use error::Res;
