// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Tasks.
//!
//! A task is a boxed future plus a lifecycle state. Nothing wakes tasks
//! through the `Waker`: they are polled with a no-op waker, and suspension
//! happens only at runtime awaitables, which hand the task's continuation
//! to a stage, event, race, or bridge. Whoever holds the continuation
//! decides when the task runs next.
//!
//! Two shapes are exposed:
//! - `Task<T>`: lazy, owned by its awaiter, produces a value.
//! - `spawn`: fire-and-forget; runs to its first suspension immediately and
//!   frees its future once it completes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, Waker};

use crate::context;
use crate::continuation::Continuation;

/// Type-erased, thread-local future owned by a `RawTask`.
pub(crate) type LocalBoxFuture = Pin<Box<dyn Future<Output = ()>>>;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Task lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Created, never polled.
    Ready,
    /// Being polled right now.
    Running,
    /// Suspended; some wait-list holds its continuation.
    Waiting,
    /// Ran to completion. Its future has been dropped.
    Complete,
    /// Aborted by its owner (a race). Its future has been dropped and any
    /// outstanding continuation is inert.
    Destroyed,
}

pub(crate) struct RawTask {
    id: TaskId,
    state: Cell<TaskState>,
    future: RefCell<Option<LocalBoxFuture>>,
    spawned_at: &'static Location<'static>,
}

impl fmt::Debug for RawTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawTask")
            .field("id", &self.id)
            .field("state", &self.state.get())
            .field("spawned_at", &format_args!("{}", self.spawned_at))
            .finish()
    }
}

impl RawTask {
    pub fn new(future: LocalBoxFuture, spawned_at: &'static Location<'static>) -> Rc<Self> {
        Rc::new(Self {
            id: TaskId::next(),
            state: Cell::new(TaskState::Ready),
            future: RefCell::new(Some(future)),
            spawned_at,
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> TaskState {
        self.state.get()
    }

    pub fn spawned_at(&self) -> &'static Location<'static> {
        self.spawned_at
    }

    /// Poll the future once with this task installed as the running task.
    /// Returns true if the task completed.
    ///
    /// Panics if the task is complete, destroyed, or already running: a
    /// continuation was resumed that should not have been.
    pub fn poll(self: &Rc<Self>) -> bool {
        match self.state.get() {
            TaskState::Complete => panic!(
                "resumed {} (spawned at {}) after it completed",
                self.id, self.spawned_at
            ),
            TaskState::Destroyed => panic!(
                "resumed {} (spawned at {}) after it was destroyed",
                self.id, self.spawned_at
            ),
            TaskState::Running => panic!(
                "resumed {} (spawned at {}) while it was already running",
                self.id, self.spawned_at
            ),
            TaskState::Ready | TaskState::Waiting => {}
        }

        // Take the future out of its slot so code running inside the poll
        // may destroy this task without a double borrow.
        let Some(mut future) = self.future.borrow_mut().take() else {
            panic!("{} has no future to poll", self.id);
        };
        self.state.set(TaskState::Running);

        let poll = {
            let _running = context::enter(Rc::clone(self));
            let mut cx = Context::from_waker(Waker::noop());
            future.as_mut().poll(&mut cx)
        };

        match poll {
            Poll::Ready(()) => {
                self.state.set(TaskState::Complete);
                drop(future);
                true
            }
            Poll::Pending if self.state.get() == TaskState::Destroyed => {
                drop(future);
                false
            }
            Poll::Pending => {
                self.state.set(TaskState::Waiting);
                *self.future.borrow_mut() = Some(future);
                false
            }
        }
    }

    /// Abort the task: drop its future (running destructors of everything it
    /// holds, wait registrations included) and make its continuations inert.
    /// No-op on finished tasks. A running task is marked and its future is
    /// dropped when the current poll returns.
    pub fn destroy(&self) {
        match self.state.get() {
            TaskState::Complete | TaskState::Destroyed => {}
            TaskState::Running => self.state.set(TaskState::Destroyed),
            TaskState::Ready | TaskState::Waiting => {
                self.state.set(TaskState::Destroyed);
                let future = self.future.borrow_mut().take();
                drop(future);
                log::trace!("destroyed {} (spawned at {})", self.id, self.spawned_at);
            }
        }
    }
}

/// Start a fire-and-forget task.
///
/// The future runs immediately, up to its first suspension point, before
/// `spawn` returns. After that it is owned by whichever wait-list holds its
/// continuation, and its future is dropped as soon as it completes.
#[track_caller]
pub fn spawn<F>(future: F) -> TaskId
where
    F: Future<Output = ()> + 'static,
{
    let at = Location::caller();
    let task = RawTask::new(Box::pin(future), at);
    let id = task.id();
    log::trace!("spawned {} at {}", id, at);
    Continuation::new(task, at).resume();
    id
}

enum Slot<T> {
    Pending(Pin<Box<dyn Future<Output = T>>>),
    Finished,
}

/// A lazily started computation producing `T`.
///
/// Nothing runs until the task is awaited; awaiting it drives it as part of
/// the awaiting task. Dropping an unfinished `Task` drops its future, which
/// aborts the computation and releases whatever it was waiting on.
#[must_use = "a `Task` does nothing unless awaited; use `spawn` for fire-and-forget work"]
pub struct Task<T> {
    slot: Slot<T>,
}

impl<T> Task<T> {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = T> + 'static,
    {
        Self {
            slot: Slot::Pending(Box::pin(future)),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.slot, Slot::Finished)
    }
}

impl<T: 'static> Task<T> {
    /// Hand the task over to the runtime and discard its value.
    #[track_caller]
    pub fn detach(self) -> TaskId {
        spawn(async move {
            let _ = self.await;
        })
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl<T> Future for Task<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let Slot::Pending(future) = &mut self.slot else {
            panic!("`Task` polled again after it produced its value");
        };
        match future.as_mut().poll(cx) {
            Poll::Ready(value) => {
                self.slot = Slot::Finished;
                Poll::Ready(value)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use crate::stage::StageId;

    #[test]
    fn spawn_runs_to_first_suspension() {
        let scheduler = Scheduler::new();
        let update = scheduler.stage(StageId::UPDATE);
        let steps = Rc::new(Cell::new(0));

        let counter = Rc::clone(&steps);
        let stage = Rc::clone(&update);
        spawn(async move {
            counter.set(1);
            stage.next_tick().await;
            counter.set(2);
        });

        assert_eq!(steps.get(), 1);
        assert_eq!(update.ready_len(), 1);
        scheduler.run(StageId::UPDATE);
        assert_eq!(steps.get(), 2);
        assert_eq!(update.ready_len(), 0);
    }

    #[test]
    fn task_is_lazy_and_yields_value() {
        let scheduler = Scheduler::new();
        let update = scheduler.stage(StageId::UPDATE);
        let started = Rc::new(Cell::new(false));
        let result = Rc::new(Cell::new(0));

        let flag = Rc::clone(&started);
        let stage = Rc::clone(&update);
        let task = Task::new(async move {
            flag.set(true);
            stage.next_tick().await;
            21 * 2
        });
        assert!(!started.get());

        let out = Rc::clone(&result);
        spawn(async move {
            out.set(task.await);
        });
        assert!(started.get());
        assert_eq!(result.get(), 0);

        scheduler.run(StageId::UPDATE);
        assert_eq!(result.get(), 42);
    }

    #[test]
    fn dropping_task_aborts_it() {
        let scheduler = Scheduler::new();
        let update = scheduler.stage(StageId::UPDATE);
        let finished = Rc::new(Cell::new(false));

        let flag = Rc::clone(&finished);
        let stage = Rc::clone(&update);
        let task: Task<()> = Task::new(async move {
            stage.next_tick().await;
            flag.set(true);
        });
        drop(task);
        scheduler.run(StageId::UPDATE);
        assert!(!finished.get());
    }

    #[test]
    fn destroyed_task_drops_its_future() {
        let alive = Rc::new(());
        let held = Rc::clone(&alive);
        let task = RawTask::new(
            Box::pin(async move {
                let _held = held;
            }),
            Location::caller(),
        );
        assert_eq!(Rc::strong_count(&alive), 2);
        task.destroy();
        assert_eq!(task.state(), TaskState::Destroyed);
        assert_eq!(Rc::strong_count(&alive), 1);
    }

    #[test]
    #[should_panic(expected = "after it completed")]
    fn polling_completed_task_panics() {
        let task = RawTask::new(Box::pin(async {}), Location::caller());
        assert!(task.poll());
        task.poll();
    }

    #[test]
    fn task_ids_are_unique() {
        let a = spawn(async {});
        let b = spawn(async {});
        assert_ne!(a, b);
    }
}
