//! Idempotent resource-release primitives.
//!
//! [`Disposable`] is the leaf lifecycle primitive everything else builds on:
//! a handle whose [`dispose`](Dispose::dispose) transitions a monotonic
//! not-disposed → disposed flag exactly once, running registered cleanup
//! callbacks and child disposables along the way. Event subscriptions and
//! runners hand these out so owners can release resources deterministically.
//!
//! Scoped acquisition is RAII: dropping the last handle to an undisposed
//! `Disposable` runs its cleanup, so release is guaranteed on every exit
//! path without matching acquire/release calls.

use parking_lot::Mutex;
use smallvec::SmallVec;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// A resource that can be released exactly once.
pub trait Dispose {
    /// Releases the resource.
    ///
    /// Returns `true` the first time the release actually happened and
    /// `false` on every subsequent call. Idempotence is mandatory: callers
    /// may dispose any number of times.
    fn dispose(&self) -> bool;

    /// Returns true if the resource has already been released.
    fn is_disposed(&self) -> bool;
}

type Cleanup = Box<dyn FnOnce() + Send>;

/// Cleanup state while the disposable is still armed.
struct Armed {
    /// Run in registration order at disposal.
    cleanups: SmallVec<[Cleanup; 4]>,
    /// Disposed after the callbacks, in reverse-registration order.
    children: Vec<Disposable>,
}

struct Inner {
    armed: Mutex<Option<Armed>>,
}

/// An idempotent resource-release handle.
///
/// Cloning produces another handle to the same underlying resource; disposal
/// through any handle releases it for all of them.
#[derive(Clone)]
pub struct Disposable {
    inner: Arc<Inner>,
}

impl Default for Disposable {
    fn default() -> Self {
        Self::new()
    }
}

impl Disposable {
    /// Creates a new, undisposed handle with no cleanup work attached.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                armed: Mutex::new(Some(Armed {
                    cleanups: SmallVec::new(),
                    children: Vec::new(),
                })),
            }),
        }
    }

    /// Creates a handle that runs `f` when disposed.
    #[must_use]
    pub fn with_cleanup(f: impl FnOnce() + Send + 'static) -> Self {
        let d = Self::new();
        d.on_dispose(f);
        d
    }

    /// Registers a cleanup callback, invoked exactly once at disposal.
    ///
    /// Callbacks run in registration order. If this handle is already
    /// disposed the callback runs immediately, preserving the exactly-once
    /// guarantee rather than silently leaking the cleanup.
    pub fn on_dispose(&self, f: impl FnOnce() + Send + 'static) {
        let mut armed = self.inner.armed.lock();
        match armed.as_mut() {
            Some(state) => state.cleanups.push(Box::new(f)),
            None => {
                drop(armed);
                tracing::trace!("cleanup registered after disposal; running inline");
                f();
            }
        }
    }

    /// Attaches a child disposable, released when this handle is disposed.
    ///
    /// Children are disposed after the cleanup callbacks, in reverse
    /// registration order. An already-disposed parent disposes the child
    /// immediately.
    pub fn adopt(&self, child: Disposable) {
        let mut armed = self.inner.armed.lock();
        match armed.as_mut() {
            Some(state) => state.children.push(child),
            None => {
                drop(armed);
                child.dispose();
            }
        }
    }
}

impl Dispose for Disposable {
    fn dispose(&self) -> bool {
        let Some(state) = self.inner.armed.lock().take() else {
            return false;
        };
        sweep(state, true);
        true
    }

    fn is_disposed(&self) -> bool {
        self.inner.armed.lock().is_none()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(state) = self.armed.get_mut().take() {
            // Last handle dropped without an explicit dispose. Never unwind
            // out of drop; failures are logged instead.
            sweep(state, false);
        }
    }
}

impl std::fmt::Debug for Disposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposable")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Runs every cleanup and child disposal, even when some fail.
///
/// Failures (panics from a cleanup or a child) are collected; after the full
/// sweep the first one is re-raised when `reraise` is set, so a disposal
/// failure is surfaced as the contract failure it is without leaving later
/// resources unreleased.
fn sweep(state: Armed, reraise: bool) {
    let mut failures: Vec<String> = Vec::new();

    for cleanup in state.cleanups {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(cleanup)) {
            failures.push(crate::task::panic_message(payload.as_ref()));
        }
    }
    for child in state.children.into_iter().rev() {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| child.dispose())) {
            failures.push(crate::task::panic_message(payload.as_ref()));
        }
    }

    if failures.is_empty() {
        return;
    }
    for failure in &failures {
        tracing::warn!(%failure, "disposal cleanup failed");
    }
    if reraise {
        panic!("disposal failed: {}", failures[0]);
    }
}
