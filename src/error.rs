//! Operation-failure types for Taskline.
//!
//! This module defines the error type carried inside [`Outcome::Failure`]
//! (see [`crate::outcome`]). Error handling follows two rules:
//!
//! - **Operation failures** are expected, recoverable runtime conditions
//!   (not-found, parse failure, wrapped external I/O failure). They are always
//!   carried inside an [`Outcome`], never raised directly, and can be handled
//!   with [`Outcome::recover`] / [`Outcome::recover_if`].
//! - **Contract failures** are precondition or invariant violations
//!   (scheduling on a disposed runner, an empty `sequence` input, a panicking
//!   work closure). They are programmer errors: they panic, are never wrapped
//!   in an [`Outcome`], and cannot be intercepted by recovery combinators.
//!
//! [`Outcome`]: crate::outcome::Outcome
//! [`Outcome::Failure`]: crate::outcome::Outcome::Failure
//! [`Outcome::recover`]: crate::outcome::Outcome::recover
//! [`Outcome::recover_if`]: crate::outcome::Outcome::recover_if

use core::fmt;
use std::sync::Arc;

/// The kind of operation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A requested entity does not exist.
    NotFound,
    /// Input could not be parsed or decoded.
    Parse,
    /// A wrapped failure from an external collaborator (I/O, OS, library).
    External,
    /// A caller-defined failure with no more specific kind.
    User,
}

impl ErrorKind {
    /// Returns a short static name for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::Parse => "Parse",
            Self::External => "External",
            Self::User => "User",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation failure: a kind plus an optional message and source chain.
///
/// Two errors compare equal when their kind and message match; the source
/// chain is diagnostic detail and does not participate in equality.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind and no message.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound).with_message(what)
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse).with_message(detail)
    }

    /// Creates an error wrapping a failure from an external collaborator.
    #[must_use]
    pub fn external(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        let msg = source.to_string();
        Self::new(ErrorKind::External)
            .with_message(msg)
            .with_source(source)
    }

    /// Creates a caller-defined error.
    #[must_use]
    pub fn user(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::User).with_message(detail)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns true if this is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound)
    }

    /// Returns true if this is a parse error.
    #[must_use]
    pub const fn is_parse(&self) -> bool {
        matches!(self.kind, ErrorKind::Parse)
    }

    /// Returns true if this wraps an external failure.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        matches!(self.kind, ErrorKind::External)
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

impl Eq for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::external(e)
    }
}

/// A specialized `Result` for fallible Taskline operations, used where a
/// caller propagates with `?` instead of composing on an [`Outcome`].
///
/// [`Outcome`]: crate::outcome::Outcome
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn display_without_message() {
        let err = Error::new(ErrorKind::NotFound);
        assert_eq!(err.to_string(), "NotFound");
    }

    #[test]
    fn display_with_message() {
        let err = Error::not_found("config.json");
        assert_eq!(err.to_string(), "NotFound: config.json");
    }

    #[test]
    fn equality_is_kind_plus_message() {
        let a = Error::parse("bad digit");
        let b = Error::parse("bad digit");
        let c = Error::parse("bad sign");
        let d = Error::user("bad digit");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn source_excluded_from_equality() {
        let io = std::io::Error::other("boom");
        let with_source = Error::new(ErrorKind::External)
            .with_message("boom")
            .with_source(io);
        let without = Error::new(ErrorKind::External).with_message("boom");
        assert_eq!(with_source, without);
        assert!(with_source.source().is_some());
        assert!(without.source().is_none());
    }

    #[test]
    fn external_wraps_and_chains() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::external(io);
        assert!(err.is_external());
        assert_eq!(err.message(), Some("refused"));
        assert!(err.source().is_some());
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert_eq!(err.kind(), ErrorKind::External);
    }
}
