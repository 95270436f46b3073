use crate::api::Mode;
use crate::args::ExportArgs;
use crate::commands::{count_of, forget_rejected_token, open_session, Out};
use crate::error::{ErrorType, IntoResult};
use crate::export::{self, Scope};
use crate::{Config, Result};
use chrono::Local;
use serde::Serialize;
use std::path::PathBuf;

/// What `cashflow export` wrote.
#[derive(Debug, Clone, Serialize)]
pub struct Exported {
    pub path: PathBuf,
    pub scope: Scope,
    pub count: usize,
}

/// Loads the document and writes the transactions selected by `args` to a pretty-printed JSON
/// file, in stored order.
pub async fn export(config: &Config, mode: Mode, args: &ExportArgs) -> Result<Out<Exported>> {
    let mut session = open_session(config, mode).await?;
    let loaded = session.load().await.map(|s| s.transactions().to_vec());
    let transactions = forget_rejected_token(config, loaded).await?;

    let selected = export::select(&transactions, args.scope(), &args.filter());
    let path = match args.out() {
        Some(p) => p.to_path_buf(),
        None => export::default_file_name(args.scope(), Local::now().date_naive()),
    };
    export::write(&path, &selected)
        .await
        .pub_result(ErrorType::Io)?;

    let message = format!(
        "Exported {} to {}",
        count_of(selected.len(), "transaction"),
        path.display()
    );
    Ok(Out::new(
        message,
        Exported {
            path,
            scope: args.scope(),
            count: selected.len(),
        },
    ))
}
