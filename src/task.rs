//! Schedulable, chainable units of work.
//!
//! A [`Task`] is the deferred counterpart of an [`Outcome`]: a node created
//! by [`Runner::schedule`] that moves Pending → Running → terminal under the
//! control of its owning runner's execution loop. Callers only observe the
//! state; they never set it.
//!
//! Continuations attach with [`Task::then`] / [`Task::and_then`]: the child
//! task is created immediately but is only submitted to its runner once the
//! parent reaches a terminal state, so a chain guarantees the child observes
//! the parent's result before starting. A faulted parent still schedules the
//! child — the failure is forwarded as the child's outcome without running
//! the child's transform, mirroring [`Outcome::map`]'s short-circuit at the
//! scheduling level.
//!
//! Work-closure panics are contract failures: the task becomes faulted and
//! [`Task::join`] re-raises the panic message. Operation failures travel as
//! [`Outcome::Failure`] and never panic until someone unwraps.
//!
//! [`Runner::schedule`]: crate::runner::Runner::schedule
//! [`Outcome`]: crate::outcome::Outcome
//! [`Outcome::map`]: crate::outcome::Outcome::map
//! [`Outcome::Failure`]: crate::outcome::Outcome::Failure

use crate::outcome::Outcome;
use crate::runner::{JobWork, Runner, RunnerCore, TaskJob};
use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(0);

/// Observable lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Queued, not yet picked up by the runner.
    Pending,
    /// Currently executing on the runner.
    Running,
    /// Finished with a success value.
    Completed,
    /// Finished with an operation failure, a forwarded fault, or abandonment.
    Faulted,
}

/// Terminal record of a task: a resolved outcome, or a contract failure
/// (work panic or abandonment) that must re-raise at the join boundary.
pub(crate) enum Terminal<T> {
    Outcome(Outcome<T>),
    Fault(String),
}

enum Phase<T> {
    Pending,
    Running,
    Terminal(Terminal<T>),
}

type Continuation<T> = Box<dyn FnOnce(&Terminal<T>) + Send>;

struct Slot<T> {
    phase: Phase<T>,
    continuations: SmallVec<[Continuation<T>; 2]>,
}

struct TaskInner<T> {
    id: u64,
    state: Mutex<Slot<T>>,
    done: Condvar,
}

/// A handle to a scheduled unit of work producing a `T`.
///
/// Cloning yields another handle to the same node. `Task<()>` models pure
/// actions whose only payload is success or failure.
pub struct Task<T> {
    inner: Arc<TaskInner<T>>,
    core: Arc<RunnerCore>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

impl<T: Send + 'static> Task<T> {
    pub(crate) fn new_pending(core: Arc<RunnerCore>) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(Slot {
                    phase: Phase::Pending,
                    continuations: SmallVec::new(),
                }),
                done: Condvar::new(),
            }),
            core,
        }
    }

    /// Returns this task's identifier, unique within the process.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        match &self.inner.state.lock().phase {
            Phase::Pending => TaskState::Pending,
            Phase::Running => TaskState::Running,
            Phase::Terminal(Terminal::Outcome(Outcome::Success(_))) => TaskState::Completed,
            Phase::Terminal(_) => TaskState::Faulted,
        }
    }

    /// Returns true once the task has completed or faulted.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.inner.state.lock().phase, Phase::Terminal(_))
    }

    /// Registers a continuation on this task's runner.
    ///
    /// The child task is submitted only after this task reaches a terminal
    /// state. On success `f` receives the value; on failure or fault `f` is
    /// skipped and the cause is forwarded as the child's result.
    pub fn then<U, F>(&self, f: F) -> Task<U>
    where
        T: Clone,
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.continue_on(&self.core.clone(), move |v| Outcome::success(f(v)))
    }

    /// Like [`Task::then`], for a transform that may itself fail.
    pub fn and_then<U, F>(&self, f: F) -> Task<U>
    where
        T: Clone,
        U: Send + 'static,
        F: FnOnce(T) -> Outcome<U> + Send + 'static,
    {
        self.continue_on(&self.core.clone(), f)
    }

    /// Registers a continuation on an explicitly named runner.
    pub fn then_on<U, F>(&self, runner: &Runner, f: F) -> Task<U>
    where
        T: Clone,
        U: Send + 'static,
        F: FnOnce(T) -> Outcome<U> + Send + 'static,
    {
        self.continue_on(runner.core(), f)
    }

    fn continue_on<U, F>(&self, target: &Arc<RunnerCore>, f: F) -> Task<U>
    where
        T: Clone,
        U: Send + 'static,
        F: FnOnce(T) -> Outcome<U> + Send + 'static,
    {
        let child: Task<U> = Task::new_pending(Arc::clone(target));
        let submitted = child.clone();
        let target = Arc::clone(target);

        self.add_continuation(Box::new(move |terminal: &Terminal<T>| {
            let work = match terminal {
                Terminal::Outcome(Outcome::Success(v)) => {
                    let v = v.clone();
                    JobWork::Invoke(Box::new(move || f(v)))
                }
                Terminal::Outcome(Outcome::Failure(e)) => {
                    JobWork::Deliver(Outcome::failure(e.clone()))
                }
                Terminal::Fault(msg) => JobWork::Fault(msg.clone()),
            };
            target.submit(Box::new(TaskJob {
                task: submitted,
                work,
            }));
        }));
        child
    }

    /// Blocks until this task reaches a terminal state.
    ///
    /// On a cooperative runner the calling thread drains and executes the
    /// runner's queue instead of idling — a thread never parks on a queue it
    /// alone can drain. On a pooled runner the thread parks on the task's
    /// completion signal.
    pub fn wait(&self) {
        if self.core.is_cooperative() {
            let inner = Arc::clone(&self.inner);
            self.core
                .drive_until(&move || matches!(inner.state.lock().phase, Phase::Terminal(_)));
        } else {
            let mut slot = self.inner.state.lock();
            while !matches!(slot.phase, Phase::Terminal(_)) {
                self.inner.done.wait(&mut slot);
            }
        }
    }

    /// Blocks until terminal and returns the task's outcome.
    ///
    /// # Panics
    ///
    /// Re-raises the task's contract failure if its work panicked or the
    /// task was abandoned by runner disposal. Operation failures are
    /// returned inside the [`Outcome`], not raised.
    #[must_use]
    pub fn join(&self) -> Outcome<T>
    where
        T: Clone,
    {
        self.wait();
        match self.terminal_outcome() {
            Ok(outcome) => outcome,
            Err(fault) => panic!("{fault}"),
        }
    }

    /// Snapshot of the terminal record. Callers must have observed
    /// `is_terminal()` first.
    pub(crate) fn terminal_outcome(&self) -> Result<Outcome<T>, String>
    where
        T: Clone,
    {
        match &self.inner.state.lock().phase {
            Phase::Terminal(Terminal::Outcome(o)) => Ok(o.clone()),
            Phase::Terminal(Terminal::Fault(msg)) => Err(msg.clone()),
            _ => unreachable!("terminal_outcome called before task completed"),
        }
    }

    /// Marks the task running. Returns false if the task was already
    /// abandoned, in which case the work must not run.
    pub(crate) fn begin(&self) -> bool {
        let mut slot = self.inner.state.lock();
        match slot.phase {
            Phase::Pending => {
                tracing::trace!(task = self.inner.id, "task running");
                slot.phase = Phase::Running;
                true
            }
            Phase::Terminal(_) => false,
            Phase::Running => unreachable!("task started twice"),
        }
    }

    pub(crate) fn finish(&self, outcome: Outcome<T>) {
        self.complete(Terminal::Outcome(outcome));
    }

    pub(crate) fn fault(&self, message: String) {
        self.complete(Terminal::Fault(message));
    }

    fn complete(&self, terminal: Terminal<T>) {
        {
            let mut slot = self.inner.state.lock();
            if matches!(slot.phase, Phase::Terminal(_)) {
                return;
            }
            tracing::trace!(
                task = self.inner.id,
                faulted = matches!(
                    terminal,
                    Terminal::Fault(_) | Terminal::Outcome(Outcome::Failure(_))
                ),
                "task terminal"
            );
            slot.phase = Phase::Terminal(terminal);
            self.inner.done.notify_all();

            let continuations = std::mem::take(&mut slot.continuations);
            let Phase::Terminal(terminal) = &slot.phase else {
                unreachable!()
            };
            // Registration order.
            for continuation in continuations {
                continuation(terminal);
            }
        }
        // Joiners parked on a cooperative queue re-check on this signal.
        self.core.wake_all();
    }

    fn add_continuation(&self, continuation: Continuation<T>) {
        let mut slot = self.inner.state.lock();
        match &slot.phase {
            Phase::Terminal(terminal) => continuation(terminal),
            _ => slot.continuations.push(continuation),
        }
    }
}

/// Renders a panic payload as a message for fault records and logs.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
