// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Continuations: resumable handles to suspended tasks.
//!
//! A continuation is created by a runtime awaitable at the moment its task
//! suspends and is moved into exactly one wait-list (a stage queue, an event,
//! a race, a bridge record). It is deliberately not `Clone`: whoever holds it
//! is the one party allowed to resume the task.

use std::fmt;
use std::panic::Location;
use std::rc::Rc;

use crate::context;
use crate::task::{RawTask, TaskId, TaskState};

pub struct Continuation {
    task: Rc<RawTask>,
    suspend_point: &'static Location<'static>,
}

impl Continuation {
    pub(crate) fn new(task: Rc<RawTask>, suspend_point: &'static Location<'static>) -> Self {
        Self {
            task,
            suspend_point,
        }
    }

    /// The continuation of the running task, labelled with the caller's
    /// location. Building blocks for custom awaitables start here.
    ///
    /// Panics when called outside a runtime task.
    #[track_caller]
    pub fn current() -> Self {
        Self::capture(Location::caller())
    }

    pub(crate) fn capture(at: &'static Location<'static>) -> Self {
        match context::current() {
            Some(task) => Self::new(task, at),
            None => panic!("runtime awaitable at {at} was polled outside of a stagehand task"),
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task.id()
    }

    /// Where the task suspended.
    pub fn suspend_point(&self) -> &'static Location<'static> {
        self.suspend_point
    }

    /// True once the owning task was aborted; resuming would be an error,
    /// holders discard such continuations instead.
    pub fn is_inert(&self) -> bool {
        self.task.state() == TaskState::Destroyed
    }

    /// Run the task until its next suspension. Returns true if it completed.
    ///
    /// Panics if the task already completed or was destroyed.
    pub fn resume(self) -> bool {
        self.task.poll()
    }

    /// Abort the task this continuation belongs to.
    pub fn destroy(self) {
        self.task.destroy();
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("task", &self.task.id())
            .field("spawned_at", &format_args!("{}", self.task.spawned_at()))
            .field("suspend_point", &format_args!("{}", self.suspend_point))
            .finish()
    }
}
