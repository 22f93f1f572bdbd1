//! The resolved success-or-failure container.
//!
//! [`Outcome<T>`] is the universal return type for fallible operations: either
//! a success payload or a captured operation failure. It is immutable once
//! built and is consumed by value; consumers unwrap it at a boundary of their
//! choosing or transform it with the combinators below.
//!
//! An `Outcome` is deliberately synchronous and eagerly resolved. Deferred
//! completion is modeled by pairing an `Outcome` slot with a [`Task`]
//! (see [`crate::task`]) rather than making the container itself
//! asynchronous, which keeps its algebra (map / chain / recover) testable
//! independent of any scheduling.
//!
//! # Unwrapping vs propagating
//!
//! [`Outcome::unwrap`] and [`Outcome::check`] are the only places a captured
//! failure becomes imperative control flow (a panic). Intermediate layers
//! should prefer [`Outcome::into_result`] and `?`, or the combinators, so the
//! eager-unwrap choke point stays at the outermost caller.
//!
//! [`Task`]: crate::task::Task

use crate::error::{Error, ErrorKind};

/// The resolved result of a fallible operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The operation produced a value.
    Success(T),
    /// The operation failed with a captured error.
    Failure(Error),
}

impl<T> Outcome<T> {
    /// Constructs a successful outcome.
    #[must_use]
    pub const fn success(value: T) -> Self {
        Self::Success(value)
    }

    /// Constructs a failed outcome.
    #[must_use]
    pub const fn failure(error: Error) -> Self {
        Self::Failure(error)
    }

    /// Returns true if this outcome is a success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns true if this outcome is a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns a reference to the success value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Success(v) => Some(v),
            Self::Failure(_) => None,
        }
    }

    /// Returns a reference to the captured error, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Success(_) => None,
            Self::Failure(e) => Some(e),
        }
    }

    /// Returns the success value, raising the captured failure otherwise.
    ///
    /// This is the eager unwrap boundary: the one place an operation failure
    /// becomes a panic. Intended for outermost callers and tests; everything
    /// in between should use [`Outcome::into_result`] or the combinators.
    ///
    /// # Panics
    ///
    /// Panics with the failure's display if this is a `Failure`.
    #[must_use]
    pub fn unwrap(self) -> T {
        match self {
            Self::Success(v) => v,
            Self::Failure(e) => panic!("unwrapped a failed outcome: {e}"),
        }
    }

    /// Discards the success value, raising the captured failure otherwise.
    ///
    /// The unit counterpart of [`Outcome::unwrap`], for operations whose only
    /// meaningful payload is success or failure.
    ///
    /// # Panics
    ///
    /// Panics with the failure's display if this is a `Failure`.
    pub fn check(self) {
        if let Self::Failure(e) = self {
            panic!("checked a failed outcome: {e}");
        }
    }

    /// Converts into a standard `Result` for `?`-style propagation.
    pub fn into_result(self) -> Result<T, Error> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Failure(e) => Err(e),
        }
    }

    /// Transforms the success value; a failure is forwarded unchanged and the
    /// transform is never invoked for it.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Success(v) => Outcome::Success(f(v)),
            Self::Failure(e) => Outcome::Failure(e),
        }
    }

    /// Chains a transform that may itself fail.
    ///
    /// A failure short-circuits: the transform is skipped and the failure is
    /// forwarded unchanged. A failing transform produces the new failure.
    pub fn and_then<U, F: FnOnce(T) -> Outcome<U>>(self, f: F) -> Outcome<U> {
        match self {
            Self::Success(v) => f(v),
            Self::Failure(e) => Outcome::Failure(e),
        }
    }

    /// Runs an action on the success value and passes the outcome through
    /// unchanged. Does nothing on failure.
    #[must_use]
    pub fn on_success<F: FnOnce(&T)>(self, f: F) -> Self {
        if let Self::Success(v) = &self {
            f(v);
        }
        self
    }

    /// Recovers from any failure by computing a replacement value.
    ///
    /// A success passes through unchanged.
    #[must_use]
    pub fn recover<F: FnOnce(&Error) -> T>(self, f: F) -> Self {
        match self {
            Self::Success(v) => Self::Success(v),
            Self::Failure(e) => Self::Success(f(&e)),
        }
    }

    /// Recovers from a failure whose kind matches `kind`.
    ///
    /// Non-matching failures and successes pass through unchanged.
    #[must_use]
    pub fn recover_if<F: FnOnce(&Error) -> T>(self, kind: ErrorKind, f: F) -> Self {
        match self {
            Self::Failure(e) if e.kind() == kind => Self::Success(f(&e)),
            other => other,
        }
    }
}

impl<T> From<Result<T, Error>> for Outcome<T> {
    fn from(res: Result<T, Error>) -> Self {
        match res {
            Ok(v) => Self::Success(v),
            Err(e) => Self::Failure(e),
        }
    }
}

impl<T> From<Outcome<T>> for Result<T, Error> {
    fn from(outcome: Outcome<T>) -> Self {
        outcome.into_result()
    }
}
