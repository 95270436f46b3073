use crate::api::Mode;
use crate::commands::{forget_rejected_token, open_session, Out};
use crate::model::{NewTransaction, Transaction};
use crate::{Config, Result};

/// Validates `input` and appends it to the stored document. Nothing is sent to the store when
/// the input is invalid.
pub async fn add(config: &Config, mode: Mode, input: NewTransaction) -> Result<Out<Transaction>> {
    let transaction = input.validate()?;
    let mut session = open_session(config, mode).await?;
    let added = session.add_transaction(transaction).await;
    let added = forget_rejected_token(config, added).await?;
    let message = format!(
        "Added {} {}{}",
        added.kind(),
        added.amount().with_symbol(config.currency()),
        if added.note().is_empty() {
            String::new()
        } else {
            format!(" ({})", added.note())
        }
    );
    Ok(Out::new(message, added))
}
