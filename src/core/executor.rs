//! # Executor: cooperative single-threaded scheduler.
//!
//! The [`Executor`] interleaves queued tasks with outstanding asynchronous
//! work under a caller-provided time budget.
//!
//! ## Architecture
//! ```text
//! post(task) ───────────────► [queue] ──► wakeup (if run() is blocked)
//! dispatch(task) ─ draining? ─► exec(task) inline
//!                └─ idle ─────► [queue]
//!
//! exec(task):
//!   task() ─► Ready(v)    ─► return v
//!          ├► Pending(f)  ─► track f in [pending] ─► wakeup ─► return f
//!          └► Err(e)      ─► return Err(e)
//!
//! run(budget):
//!   loop {
//!     ├─► queue empty and nothing pending      → done
//!     ├─► budget exhausted                     → done
//!     ├─► poll(remaining): full passes over the queue
//!     └─► nothing executed:
//!           wait for the first of { pending settles, wakeup, budget timer }
//!   }
//! ```
//!
//! ## Rules
//! - `poll` snapshots the queue length per pass: tasks queued during a pass
//!   run on the next pass (FIFO fairness).
//! - While draining, `dispatch` executes inline instead of queueing.
//! - A failing task does not stop the drain; the first failure observed is
//!   returned once the drain ends.
//! - Outstanding work leaves the pending set the moment it settles, whether
//!   it succeeded or failed.
//! - A budget stops *waiting*, never the work itself: unfinished futures stay
//!   pending and keep making progress whenever they are polled again.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures::future::{self, FutureExt, LocalBoxFuture, Shared};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::core::eventual::{Eventual, IntoEventual, SharedFuture};
use crate::core::queue::Queue;
use crate::core::timer::DeadlineTimer;
use crate::error::{Error, Result};
use crate::identity::Value;

/// Unit of queued work, consumed exactly once.
pub type Task = Box<dyn FnOnce() -> Result<Eventual<Value>>>;

/// In-flight work the run loop must wait for.
struct Outstanding {
    id: u64,
    settled: Shared<LocalBoxFuture<'static, ()>>,
}

struct Inner {
    queue: RefCell<Queue<Task>>,
    pending: RefCell<Vec<Outstanding>>,
    running: Cell<usize>,
    wakeup: RefCell<Option<oneshot::Sender<()>>>,
    failure: RefCell<Option<Error>>,
    next_id: Cell<u64>,
}

impl Inner {
    fn wake(&self) {
        if let Some(tx) = self.wakeup.borrow_mut().take() {
            let _ = tx.send(());
        }
    }

    fn record(&self, err: Error) {
        tracing::warn!(label = err.as_label(), error = %err, "executor.task_failed");
        let mut failure = self.failure.borrow_mut();
        if failure.is_none() {
            *failure = Some(err);
        }
    }

    fn take_failure(&self) -> Option<Error> {
        self.failure.borrow_mut().take()
    }
}

/// Keeps the executor in draining mode while alive.
struct Draining(Rc<Inner>);

impl Draining {
    fn enter(inner: &Rc<Inner>) -> Self {
        inner.running.set(inner.running.get() + 1);
        Self(Rc::clone(inner))
    }
}

impl Drop for Draining {
    fn drop(&mut self) {
        self.0.running.set(self.0.running.get() - 1);
    }
}

thread_local! {
    static SHARED: Executor = Executor::new();
}

/// Cooperative scheduler for queued tasks and outstanding futures.
///
/// Cheap to clone; clones share the same queue and pending set.
///
/// ## Example
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use std::time::Duration;
/// use taskscope::Executor;
///
/// let history = Rc::new(RefCell::new(Vec::new()));
/// let executor = Executor::new();
/// for n in [1, 2] {
///     let h = Rc::clone(&history);
///     executor.post(move || h.borrow_mut().push(n));
/// }
/// assert_eq!(executor.poll(Duration::MAX).unwrap(), 2);
/// assert_eq!(*history.borrow(), vec![1, 2]);
/// ```
#[derive(Clone)]
pub struct Executor {
    inner: Rc<Inner>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    /// Creates an executor with an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                queue: RefCell::new(Queue::new()),
                pending: RefCell::new(Vec::new()),
                running: Cell::new(0),
                wakeup: RefCell::new(None),
                failure: RefCell::new(None),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Thread-wide default executor, created on first use.
    ///
    /// Executors are single-threaded, so "process-wide" means "for the
    /// lifetime of the calling thread". Prefer passing an explicit executor.
    pub fn shared() -> Self {
        SHARED.with(Clone::clone)
    }

    /// True while a `poll` or `run` is in progress.
    pub fn is_running(&self) -> bool {
        self.inner.running.get() > 0
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// True if no task is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.queue.borrow().is_empty()
    }

    /// Number of outstanding asynchronous operations.
    pub fn pending(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Runs `work` now.
    ///
    /// A synchronous failure is returned to the caller. A pending result is
    /// tracked as outstanding until it settles; if it settles with an error,
    /// the error is also reported at the scheduler boundary (the current or
    /// next drain).
    pub fn exec<R, F>(&self, work: F) -> Result<Eventual<Value>>
    where
        R: IntoEventual,
        F: FnOnce() -> R,
    {
        let outcome = work().into_eventual()?;
        if let Eventual::Pending(fut) = &outcome {
            self.track(fut.clone());
        }
        Ok(outcome)
    }

    /// Executes inline while draining, otherwise queues.
    pub fn dispatch<R, F>(&self, task: F) -> &Self
    where
        R: IntoEventual,
        F: FnOnce() -> R + 'static,
    {
        if self.is_running() {
            if let Err(err) = self.exec(task) {
                self.inner.record(err);
            }
        } else {
            self.inner.queue.borrow_mut().push(boxed(task));
        }
        self
    }

    /// Queues `task` and wakes a blocked `run`.
    pub fn post<R, F>(&self, task: F) -> &Self
    where
        R: IntoEventual,
        F: FnOnce() -> R + 'static,
    {
        self.inner.queue.borrow_mut().push(boxed(task));
        tracing::trace!(queued = self.len(), "executor.post");
        self.inner.wake();
        self
    }

    /// Synchronously drains the queue until it is empty or `budget` elapses.
    ///
    /// Returns the number of executed tasks, or the first failure among them.
    pub fn poll(&self, budget: Duration) -> Result<usize> {
        let count = self.drain(budget);
        match self.inner.take_failure() {
            Some(err) => Err(err),
            None => Ok(count),
        }
    }

    /// Drains the queue and waits out outstanding work, within `budget`.
    ///
    /// The executor enters draining mode as soon as this is called (before
    /// the returned future is first polled), so `dispatch` issued right after
    /// executes inline.
    ///
    /// Resolves to the total number of executed tasks, or to the first
    /// failure observed during the run.
    pub fn run(&self, budget: Duration) -> impl Future<Output = Result<usize>> + 'static {
        let draining = Draining::enter(&self.inner);
        let this = self.clone();
        async move {
            let _draining = draining;
            let start = Instant::now();
            let mut timer = DeadlineTimer::after(budget);
            let mut counter = 0;
            loop {
                if this.is_empty() && this.pending() == 0 {
                    break;
                }
                let remaining = budget.saturating_sub(start.elapsed());
                if remaining.is_zero() {
                    break;
                }
                let count = this.drain(remaining);
                counter += count;
                if count == 0 {
                    this.wait(&mut timer).await;
                }
            }
            tracing::debug!(
                executed = counter,
                queued = this.len(),
                pending = this.pending(),
                "executor.run finished"
            );
            match this.inner.take_failure() {
                Some(err) => Err(err),
                None => Ok(counter),
            }
        }
    }

    /// Full passes over the queue; tasks queued mid-pass run next pass.
    fn drain(&self, budget: Duration) -> usize {
        let _draining = Draining::enter(&self.inner);
        let start = Instant::now();
        let mut counter = 0;
        loop {
            let length = self.len();
            if length == 0 || start.elapsed() >= budget {
                break;
            }
            for _ in 0..length {
                let Some(task) = self.inner.queue.borrow_mut().shift() else {
                    break;
                };
                counter += 1;
                if let Err(err) = self.exec(task) {
                    self.inner.record(err);
                }
            }
        }
        counter
    }

    /// Blocks until any outstanding operation settles, new work is posted,
    /// or `timer` fires.
    async fn wait(&self, timer: &mut DeadlineTimer) {
        let (tx, rx) = oneshot::channel();
        *self.inner.wakeup.borrow_mut() = Some(tx);

        let outstanding: Vec<_> = self
            .inner
            .pending
            .borrow()
            .iter()
            .map(|op| op.settled.clone())
            .collect();
        let first_settled = async move {
            if outstanding.is_empty() {
                future::pending::<()>().await;
            } else {
                future::select_all(outstanding).await;
            }
        };

        tokio::select! {
            _ = first_settled => {}
            _ = rx => {}
            _ = timer => {}
        }
        self.inner.wakeup.borrow_mut().take();
    }

    /// Adds `fut` to the pending set; it removes itself once settled.
    fn track(&self, fut: SharedFuture<Value>) {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);

        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        let settled = async move {
            let outcome = fut.await;
            if let Some(inner) = weak.upgrade() {
                inner.pending.borrow_mut().retain(|op| op.id != id);
                if let Err(err) = outcome {
                    inner.record(err);
                }
            }
        }
        .boxed_local()
        .shared();

        self.inner
            .pending
            .borrow_mut()
            .push(Outstanding { id, settled });
        self.inner.wake();
    }
}

fn boxed<R, F>(task: F) -> Task
where
    R: IntoEventual,
    F: FnOnce() -> R + 'static,
{
    Box::new(move || task().into_eventual())
}
