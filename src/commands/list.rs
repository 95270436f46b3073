//! Read-only command handlers that render a view of the stored document.

use crate::api::Mode;
use crate::args::ViewArgs;
use crate::commands::{forget_rejected_token, open_session, Out};
use crate::view::View;
use crate::{render, Config, Result};
use chrono::Utc;

/// Lists transactions grouped into buckets, most recent bucket first. Each row shows the index
/// that `cashflow delete` expects. The document version is printed last so that it can be passed
/// to `cashflow delete --expect-version`.
pub async fn list(config: &Config, mode: Mode, args: &ViewArgs) -> Result<Out<View>> {
    show(config, mode, args, true).await
}

/// Like `list` but prints only the totals.
pub async fn summary(config: &Config, mode: Mode, args: &ViewArgs) -> Result<Out<View>> {
    show(config, mode, args, false).await
}

async fn show(config: &Config, mode: Mode, args: &ViewArgs, rows: bool) -> Result<Out<View>> {
    let options = args.options(config.trailing_days());
    let mut session = open_session(config, mode).await?;
    let view = session.view(&options, Utc::now()).await;
    let view = forget_rejected_token(config, view).await?;

    let heading = options.grouping.describe(options.days);
    let mut message = render::render(&view, &heading, config.currency(), rows);
    if rows {
        if let Some(version) = session.snapshot().and_then(|s| s.version()) {
            message.push_str(&format!("\nVersion: {version}"));
        }
    }
    Ok(Out::new(message.trim_end().to_string(), view))
}
