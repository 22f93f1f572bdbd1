//! Taskline: deferred results, chainable tasks, and pluggable runners.
//!
//! # Overview
//!
//! Taskline models asynchronous computation without an async runtime: work is
//! scheduled onto a [`Runner`], produces a [`Task`] that resolves to an
//! [`Outcome`], and chains through continuations that always run on a runner
//! queue. The same program runs unchanged on a cooperative single-threaded
//! runner or a pooled multi-threaded one.
//!
//! # Core Guarantees
//!
//! - **Two failure channels**: operation failures travel as [`Outcome::Failure`]
//!   values through chains and recovery combinators; contract failures
//!   (panicking work, misuse of a disposed runner, abandoned jobs) travel as
//!   panics and are re-raised at the join point
//! - **No await deadlock**: joining a task on a cooperative runner drains the
//!   runner's own queue on the calling thread
//! - **Deterministic ordering**: FIFO within one runner's queue; a
//!   continuation always observes its parent's terminal state
//! - **Idempotent release**: every releasable resource implements
//!   [`Dispose`] with an exactly-once `true` return
//!
//! # Module Structure
//!
//! - [`error`]: Error kinds and the capturable [`Error`] value
//! - [`outcome`]: The resolved success-or-failure container
//! - [`disposable`]: Idempotent resource-release handles
//! - [`event`]: Ordered multi-subscriber callback registry
//! - [`task`]: Deferred completion and continuation chaining
//! - [`runner`]: Cooperative and pooled execution strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod disposable;
pub mod error;
pub mod event;
pub mod outcome;
pub mod runner;
pub mod task;

#[cfg(test)]
pub(crate) mod test_utils;

pub use disposable::{Disposable, Dispose};
pub use error::{Error, ErrorKind, Result};
pub use event::{action, action_ok, sequence, Action, Event};
pub use outcome::Outcome;
pub use runner::{join_all, Runner, RunnerBuilder};
pub use task::{Task, TaskState};
