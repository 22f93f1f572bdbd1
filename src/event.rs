//! Ordered multi-subscriber callback registry.
//!
//! An [`Event`] holds an ordered list of [`Action`] callbacks. Subscribing
//! returns a [`Disposable`] that removes exactly that registration; emitting
//! invokes a snapshot of the currently subscribed callbacks in subscription
//! order, so listeners added or removed mid-emission never affect the
//! in-flight invocation.
//!
//! A failing listener does not prevent the remaining listeners from running:
//! every callback in the snapshot is invoked, and the first captured failure
//! is surfaced afterwards. [`sequence`] builds a single composite callback
//! with the same fail-do-not-short-circuit policy.

use crate::disposable::Disposable;
use crate::error::Error;
use crate::outcome::Outcome;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// A shareable fallible callback.
///
/// Actions report failure through an [`Outcome`] rather than raising, so an
/// event can keep invoking the rest of its listeners after one fails.
pub type Action<A> = Arc<dyn Fn(&A) -> Outcome<()> + Send + Sync>;

/// Wraps a plain closure as an [`Action`].
pub fn action<A, F>(f: F) -> Action<A>
where
    F: Fn(&A) -> Outcome<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps an infallible closure as an [`Action`] that always succeeds.
pub fn action_ok<A, F>(f: F) -> Action<A>
where
    F: Fn(&A) + Send + Sync + 'static,
{
    Arc::new(move |arg| {
        f(arg);
        Outcome::success(())
    })
}

struct Registry<A> {
    entries: Mutex<Vec<(u64, Action<A>)>>,
    next_id: AtomicU64,
}

/// An ordered callback registry keyed by subscription handles.
pub struct Event<A> {
    registry: Arc<Registry<A>>,
}

impl<A> Clone for Event<A> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<A: 'static> Default for Event<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> Event<A> {
    /// Creates an event with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                entries: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Registers a callback and returns the handle that removes it.
    ///
    /// Disposing the handle removes exactly this registration; disposing it
    /// again (or after the registration is already gone) is a no-op.
    #[must_use = "dropping the handle unsubscribes the callback"]
    pub fn subscribe(&self, callback: Action<A>) -> Disposable {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.entries.lock().push((id, callback));

        let registry: Weak<Registry<A>> = Arc::downgrade(&self.registry);
        Disposable::with_cleanup(move || {
            if let Some(registry) = registry.upgrade() {
                registry.entries.lock().retain(|(eid, _)| *eid != id);
            }
        })
    }

    /// Invokes every currently subscribed callback, in subscription order.
    ///
    /// The subscriber list is snapshotted first: callbacks added or removed
    /// during the emission do not affect this invocation. Every callback in
    /// the snapshot runs; the first failure, if any, is returned after all
    /// have run.
    pub fn emit(&self, arg: &A) -> Outcome<()> {
        let snapshot: Vec<Action<A>> = {
            let entries = self.registry.entries.lock();
            entries.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        invoke_all(&snapshot, arg)
    }

    /// Returns the number of current subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.entries.lock().len()
    }

    /// Returns true if nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.entries.lock().is_empty()
    }
}

impl<A> std::fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("subscribers", &self.registry.entries.lock().len())
            .finish()
    }
}

/// Builds one composite callback from an ordered list of optional callbacks.
///
/// Absent (`None`) entries are skipped. The degenerate cases are fixed by
/// contract:
///
/// - zero present callbacks yield a callable no-op (never an absent value);
/// - exactly one present callback is returned as-is, observable via
///   [`Arc::ptr_eq`] — no wrapper is allocated;
/// - two or more present callbacks yield a composite that invokes each in
///   order. All of them run even when an earlier one fails, and the first
///   failure is surfaced after the sweep.
///
/// # Panics
///
/// Panics if `callbacks` is empty. A zero-length list is a caller error,
/// while a list of all-`None` entries is legal and degenerates to the no-op.
#[must_use]
pub fn sequence<A: 'static>(callbacks: &[Option<Action<A>>]) -> Action<A> {
    assert!(
        !callbacks.is_empty(),
        "sequence requires at least one entry"
    );

    let mut present: Vec<Action<A>> = callbacks.iter().flatten().map(Arc::clone).collect();
    match present.len() {
        0 => Arc::new(|_| Outcome::success(())),
        1 => present.remove(0),
        _ => Arc::new(move |arg| invoke_all(&present, arg)),
    }
}

/// Invokes every callback with `arg`; returns the first failure after all
/// have run.
fn invoke_all<A>(callbacks: &[Action<A>], arg: &A) -> Outcome<()> {
    let mut first_failure: Option<Error> = None;
    for callback in callbacks {
        if let Outcome::Failure(e) = callback(arg) {
            tracing::debug!(error = %e, "event listener failed");
            first_failure.get_or_insert(e);
        }
    }
    match first_failure {
        None => Outcome::success(()),
        Some(e) => Outcome::failure(e),
    }
}
