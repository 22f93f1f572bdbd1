//! Task runners: where and how scheduled work executes.
//!
//! A [`Runner`] owns a FIFO queue of not-yet-run jobs and an execution
//! strategy:
//!
//! - **Cooperative** ([`Runner::current_thread`]): no worker threads. Queued
//!   work runs only when the caller pumps the queue ([`Runner::run_until_idle`])
//!   or blocks on a task — a joining thread drains the queue itself rather
//!   than idling, so awaiting from the runner's own thread cannot deadlock.
//!   Used for deterministic, single-threaded execution.
//! - **Pooled** ([`Runner::pooled`]): a fixed set of worker threads
//!   continuously drains the shared queue. Used for real blocking or
//!   I/O-bound work.
//!
//! Ordering is FIFO within one runner's queue and unspecified across
//! runners; a continuation chain additionally guarantees the child observes
//! its parent's terminal state first (see [`crate::task`]).
//!
//! Disposal is idempotent. A disposed runner rejects new scheduling (a
//! contract failure), and queued-but-not-started jobs are abandoned, not
//! executed: their tasks fault, and joining one re-raises the abandonment.
//! Dropping the last user handle disposes implicitly.

use crate::disposable::Dispose;
use crate::outcome::Outcome;
use crate::task::{panic_message, Task};
use crossbeam_queue::SegQueue;
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How long a blocked joiner waits before re-checking a cooperative queue.
/// Bounds the completion-signal race without busy-spinning.
const JOIN_RECHECK_INTERVAL: Duration = Duration::from_millis(10);

/// A unit of queued work. Implemented by [`TaskJob`]; boxed into the queue.
pub(crate) trait Job: Send {
    /// Executes the job, driving its task to a terminal state.
    fn run(self: Box<Self>);
    /// Marks the job's task as abandoned without executing it.
    fn abandon(self: Box<Self>, reason: &str);
}

/// The work carried by a [`TaskJob`].
pub(crate) enum JobWork<T> {
    /// User work to execute.
    Invoke(Box<dyn FnOnce() -> Outcome<T> + Send>),
    /// A pre-resolved outcome forwarded from a failed parent.
    Deliver(Outcome<T>),
    /// A contract failure forwarded from a faulted parent.
    Fault(String),
}

/// A queued job bound to the task it resolves.
pub(crate) struct TaskJob<T: Send + 'static> {
    pub(crate) task: Task<T>,
    pub(crate) work: JobWork<T>,
}

impl<T: Send + 'static> Job for TaskJob<T> {
    fn run(self: Box<Self>) {
        let Self { task, work } = *self;
        if !task.begin() {
            return;
        }
        match work {
            JobWork::Invoke(work) => match catch_unwind(AssertUnwindSafe(work)) {
                Ok(outcome) => task.finish(outcome),
                Err(payload) => task.fault(format!(
                    "task work panicked: {}",
                    panic_message(payload.as_ref())
                )),
            },
            JobWork::Deliver(outcome) => task.finish(outcome),
            JobWork::Fault(message) => task.fault(message),
        }
    }

    fn abandon(self: Box<Self>, reason: &str) {
        self.task.fault(format!("task abandoned: {reason}"));
    }
}

enum Mode {
    Cooperative,
    Pooled {
        count: usize,
        workers: Mutex<Vec<thread::JoinHandle<()>>>,
    },
}

/// Shared state behind every handle to one runner.
pub(crate) struct RunnerCore {
    name: String,
    queue: SegQueue<Box<dyn Job>>,
    park: Mutex<()>,
    signal: Condvar,
    disposed: AtomicBool,
    mode: Mode,
}

impl RunnerCore {
    pub(crate) fn is_cooperative(&self) -> bool {
        matches!(self.mode, Mode::Cooperative)
    }

    /// Enqueues a job and wakes a waiting thread. Jobs submitted to a
    /// disposed runner are abandoned rather than silently dropped, so late
    /// continuations fault instead of hanging their joiners.
    pub(crate) fn submit(&self, job: Box<dyn Job>) {
        if self.disposed.load(Ordering::Acquire) {
            job.abandon("runner disposed");
            return;
        }
        self.queue.push(job);
        if self.disposed.load(Ordering::Acquire) {
            // Lost the race against dispose's drain; sweep what remains.
            while let Some(job) = self.queue.pop() {
                job.abandon("runner disposed");
            }
            return;
        }
        let _guard = self.park.lock();
        self.signal.notify_all();
    }

    /// Wakes every thread parked on this runner's queue.
    pub(crate) fn wake_all(&self) {
        let _guard = self.park.lock();
        self.signal.notify_all();
    }

    /// Runs queued jobs on the calling thread until `done` reports true.
    ///
    /// With an empty queue the caller parks briefly and re-checks, so a
    /// completion signaled from another thread is picked up promptly. `done`
    /// is never evaluated while the park lock is held.
    pub(crate) fn drive_until(&self, done: &dyn Fn() -> bool) {
        loop {
            if done() {
                return;
            }
            if let Some(job) = self.queue.pop() {
                job.run();
                continue;
            }
            let mut guard = self.park.lock();
            if !self.queue.is_empty() {
                drop(guard);
                continue;
            }
            let _ = self
                .signal
                .wait_for(&mut guard, JOIN_RECHECK_INTERVAL);
        }
    }

    /// Idempotent shutdown: returns true only for the call that actually
    /// disposed the runner.
    fn shutdown(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        tracing::debug!(runner = %self.name, "runner disposing");

        self.wake_all();
        while let Some(job) = self.queue.pop() {
            job.abandon("runner disposed");
        }

        if let Mode::Pooled { workers, .. } = &self.mode {
            let handles: Vec<_> = workers.lock().drain(..).collect();
            let current = thread::current().id();
            for handle in handles {
                // A worker disposing its own runner cannot join itself; the
                // thread exits on its own once it observes the flag.
                if handle.thread().id() == current {
                    continue;
                }
                let _ = handle.join();
            }
        }
        true
    }
}

impl Drop for RunnerCore {
    fn drop(&mut self) {
        debug_assert!(self.disposed.load(Ordering::Acquire));
    }
}

/// Owner tag shared by user-facing handles; disposes the runner when the
/// last user handle drops. Tasks hold only the core, so a queued chain never
/// keeps its runner alive-but-unowned.
struct Owner {
    core: Arc<RunnerCore>,
}

impl Drop for Owner {
    fn drop(&mut self) {
        self.core.shutdown();
    }
}

/// A cloneable handle to a task runner.
#[derive(Clone)]
pub struct Runner {
    core: Arc<RunnerCore>,
    _owner: Arc<Owner>,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("name", &self.core.name)
            .field("cooperative", &self.core.is_cooperative())
            .field("pending", &self.core.queue.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Runner {
    /// Creates a cooperative runner with default options.
    #[must_use]
    pub fn current_thread() -> Self {
        RunnerBuilder::current_thread().build()
    }

    /// Creates a pooled runner with `workers` threads and default options.
    ///
    /// # Panics
    ///
    /// Panics if `workers` is zero.
    #[must_use]
    pub fn pooled(workers: usize) -> Self {
        RunnerBuilder::pooled(workers).build()
    }

    pub(crate) fn core(&self) -> &Arc<RunnerCore> {
        &self.core
    }

    /// Schedules infallible work, returning its pending task.
    ///
    /// # Panics
    ///
    /// Panics (contract failure) if the runner has been disposed.
    pub fn schedule<T, F>(&self, work: F) -> Task<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.schedule_outcome(move || Outcome::success(work()))
    }

    /// Schedules fallible work, returning its pending task.
    ///
    /// # Panics
    ///
    /// Panics (contract failure) if the runner has been disposed.
    pub fn schedule_outcome<T, F>(&self, work: F) -> Task<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Outcome<T> + Send + 'static,
    {
        assert!(
            !self.is_disposed(),
            "cannot schedule on a disposed runner"
        );
        let task = Task::new_pending(Arc::clone(&self.core));
        tracing::trace!(runner = %self.core.name, task = task.id(), "task scheduled");
        self.core.submit(Box::new(TaskJob {
            task: task.clone(),
            work: JobWork::Invoke(Box::new(work)),
        }));
        task
    }

    /// Runs queued jobs on the calling thread until the queue is empty.
    ///
    /// This is the explicit pump for cooperative runners. Calling it on a
    /// pooled runner is permitted and simply competes with the workers.
    pub fn run_until_idle(&self) {
        while let Some(job) = self.core.queue.pop() {
            job.run();
        }
    }

    /// Returns the number of queued jobs not yet started.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.core.queue.len()
    }

    /// Returns the number of worker threads (zero for cooperative runners).
    #[must_use]
    pub fn worker_count(&self) -> usize {
        match self.core.mode {
            Mode::Cooperative => 0,
            Mode::Pooled { count, .. } => count,
        }
    }
}

impl Dispose for Runner {
    fn dispose(&self) -> bool {
        self.core.shutdown()
    }

    fn is_disposed(&self) -> bool {
        self.core.disposed.load(Ordering::Acquire)
    }
}

/// Waits for every task to reach a terminal state.
///
/// All tasks are waited for even when an early one fails; the first failure
/// in task order is then returned, otherwise all values in task order.
///
/// # Panics
///
/// Re-raises the first contract failure (work panic or abandonment) after
/// every task has finished.
pub fn join_all<T: Clone + Send + 'static>(tasks: &[Task<T>]) -> Outcome<Vec<T>> {
    for task in tasks {
        task.wait();
    }

    let mut values = Vec::with_capacity(tasks.len());
    let mut first_failure = None;
    let mut first_fault = None;
    for task in tasks {
        match task.terminal_outcome() {
            Ok(Outcome::Success(v)) => values.push(v),
            Ok(Outcome::Failure(e)) => {
                let _ = first_failure.get_or_insert(e);
            }
            Err(fault) => {
                let _ = first_fault.get_or_insert(fault);
            }
        }
    }
    if let Some(fault) = first_fault {
        panic!("{fault}");
    }
    match first_failure {
        Some(e) => Outcome::failure(e),
        None => Outcome::success(values),
    }
}

/// Configuration for building a [`Runner`].
#[derive(Debug, Clone)]
pub struct RunnerBuilder {
    workers: usize,
    thread_name_prefix: String,
}

impl RunnerBuilder {
    /// Starts a builder for a cooperative (caller-pumped) runner.
    #[must_use]
    pub fn current_thread() -> Self {
        Self {
            workers: 0,
            thread_name_prefix: "taskline".to_string(),
        }
    }

    /// Starts a builder for a pooled runner with `workers` threads.
    ///
    /// # Panics
    ///
    /// Panics if `workers` is zero.
    #[must_use]
    pub fn pooled(workers: usize) -> Self {
        assert!(workers > 0, "a pooled runner needs at least one worker");
        Self {
            workers,
            thread_name_prefix: "taskline".to_string(),
        }
    }

    /// Sets the prefix used for worker thread names.
    #[must_use]
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Builds the runner, spawning worker threads for pooled mode.
    #[must_use]
    pub fn build(self) -> Runner {
        let mode = if self.workers == 0 {
            Mode::Cooperative
        } else {
            Mode::Pooled {
                count: self.workers,
                workers: Mutex::new(Vec::with_capacity(self.workers)),
            }
        };
        let core = Arc::new(RunnerCore {
            name: self.thread_name_prefix.clone(),
            queue: SegQueue::new(),
            park: Mutex::new(()),
            signal: Condvar::new(),
            disposed: AtomicBool::new(false),
            mode,
        });

        if let Mode::Pooled { count, workers } = &core.mode {
            let mut handles = workers.lock();
            for i in 0..*count {
                let worker_core = Arc::clone(&core);
                let name = format!("{}-worker-{i}", self.thread_name_prefix);
                let handle = thread::Builder::new()
                    .name(name)
                    .spawn(move || worker_loop(&worker_core))
                    .expect("failed to spawn runner worker thread");
                handles.push(handle);
            }
        }

        Runner {
            _owner: Arc::new(Owner {
                core: Arc::clone(&core),
            }),
            core,
        }
    }
}

/// The drain loop for pooled worker threads.
fn worker_loop(core: &Arc<RunnerCore>) {
    loop {
        if core.disposed.load(Ordering::Acquire) {
            break;
        }
        if let Some(job) = core.queue.pop() {
            if core.disposed.load(Ordering::Acquire) {
                job.abandon("runner disposed");
            } else {
                job.run();
            }
            continue;
        }
        let mut guard = core.park.lock();
        if core.disposed.load(Ordering::Acquire) || !core.queue.is_empty() {
            drop(guard);
            continue;
        }
        core.signal.wait(&mut guard);
    }
    tracing::trace!(runner = %core.name, "worker exiting");
}
