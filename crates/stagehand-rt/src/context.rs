// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Running-task context.
//!
//! While a task is being polled, this thread-local slot names it. Runtime
//! awaitables read it to learn which continuation to park. Entering is
//! scoped by a guard so nested resumptions (spawn inside a task, a race
//! stepping its candidates) restore the outer task on the way out, panics
//! included.

use std::cell::RefCell;
use std::rc::Rc;

use crate::task::RawTask;

thread_local! {
    static CURRENT: RefCell<Option<Rc<RawTask>>> = const { RefCell::new(None) };
}

/// Restores the previously running task on drop.
pub(crate) struct EnterGuard {
    prev: Option<Rc<RawTask>>,
}

pub(crate) fn enter(task: Rc<RawTask>) -> EnterGuard {
    let prev = CURRENT.with(|slot| slot.replace(Some(task)));
    EnterGuard { prev }
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT.with(|slot| *slot.borrow_mut() = prev);
    }
}

/// The task currently being polled on this thread, if any.
pub(crate) fn current() -> Option<Rc<RawTask>> {
    CURRENT.with(|slot| slot.borrow().clone())
}

/// Whether the caller is running inside a runtime task.
pub fn in_task() -> bool {
    CURRENT.with(|slot| slot.borrow().is_some())
}
