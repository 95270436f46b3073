//! Error types for the cashflow library.
//!
//! Internally, functions return `Res<T>`, which is an `anyhow::Result`. At the boundary of the
//! library (commands and the `Store` trait) errors are converted into the public `Error` type,
//! which carries an `ErrorType` so that callers can decide how to recover.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// The internal result type.
pub(crate) type Res<T> = anyhow::Result<T>;

/// The public result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies an error by how the caller is expected to recover from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Bad user input. Nothing was sent to the store.
    Validation,
    /// The store rejected the credential. A new token must be supplied before continuing.
    Auth,
    /// The stored document changed since it was loaded. Reload and redo the mutation.
    Conflict,
    /// Any other failure talking to the store, including a stored document that cannot be decoded.
    Transport,
    /// The home directory, config file or token is missing or invalid.
    Config,
    /// A local file operation failed.
    Io,
}

serde_plain::derive_display_from_serialize!(ErrorType);

/// The public error type.
pub struct Error {
    error_type: ErrorType,
    source: anyhow::Error,
}

impl Error {
    pub(crate) fn new(error_type: ErrorType, source: impl Into<anyhow::Error>) -> Self {
        Self {
            error_type,
            source: source.into(),
        }
    }

    pub(crate) fn msg(error_type: ErrorType, message: impl Display) -> Self {
        Self::new(error_type, anyhow::anyhow!("{message}"))
    }

    /// What kind of error this is.
    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    pub fn is_validation(&self) -> bool {
        self.error_type == ErrorType::Validation
    }

    pub fn is_auth(&self) -> bool {
        self.error_type == ErrorType::Auth
    }

    pub fn is_conflict(&self) -> bool {
        self.error_type == ErrorType::Conflict
    }

    pub fn is_transport(&self) -> bool {
        self.error_type == ErrorType::Transport
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:?}", self.error_type, self.source)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.source)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Converts an internal `Res<T>` into the public `Result<T>`.
pub(crate) trait IntoResult<T> {
    /// Tags the error with `error_type`. If the error chain already holds a public `Error`, its
    /// type is kept.
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T> IntoResult<T> for Res<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| match e.downcast::<Error>() {
            Ok(typed) => typed,
            Err(e) => Error::new(error_type, e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_pub_result_tags_untyped_errors() {
        let res: Res<()> = Err(anyhow::anyhow!("boom"));
        let err = res.pub_result(ErrorType::Io).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Io);
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_pub_result_keeps_existing_type() {
        let res: Res<()> = Err(Error::msg(ErrorType::Conflict, "stale").into());
        let err = res.pub_result(ErrorType::Transport).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_display_includes_context_chain() {
        let res: Res<()> = Err(anyhow::anyhow!("inner")).context("outer");
        let err = res.pub_result(ErrorType::Transport).unwrap_err();
        assert_eq!(err.to_string(), "outer: inner");
    }

    #[test]
    fn test_error_type_display() {
        assert_eq!(ErrorType::Validation.to_string(), "validation");
        assert_eq!(ErrorType::Transport.to_string(), "transport");
    }
}
