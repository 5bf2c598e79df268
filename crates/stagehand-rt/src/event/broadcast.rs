// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Broadcast event.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use super::waitlist::{Registration, WaitList};
use crate::stage::Stage;

/// Repeatable broadcast event. Waiters always suspend; a trigger wakes
/// everyone waiting at that moment and nobody who arrives later.
pub struct Event<T> {
    stage: Rc<Stage>,
    waiters: RefCell<WaitList<T>>,
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("stage", &self.stage.id())
            .field("waiting", &self.waiting())
            .finish()
    }
}

impl<T> Event<T> {
    /// Woken waiters resume on `stage`.
    pub fn new(stage: Rc<Stage>) -> Self {
        Self {
            stage,
            waiters: RefCell::new(WaitList::new()),
        }
    }

    pub fn waiting(&self) -> usize {
        self.waiters.borrow().waiting()
    }

    #[track_caller]
    pub fn wait(&self) -> EventWait<'_, T> {
        EventWait {
            registration: Registration::new(&self.waiters),
            at: Location::caller(),
        }
    }
}

impl<T: Clone> Event<T> {
    /// Wake every current waiter with a clone of `value`. Returns how many
    /// were woken.
    #[track_caller]
    pub fn trigger(&self, value: T) -> usize {
        let woken: Vec<_> = {
            let mut waiters = self.waiters.borrow_mut();
            std::iter::from_fn(|| waiters.notify_next(value.clone())).collect()
        };
        for cont in &woken {
            log::trace!("event wakes {} (parked at {})", cont.task_id(), cont.suspend_point());
        }
        let count = woken.len();
        for cont in woken {
            self.stage.schedule(cont);
        }
        count
    }
}

/// Future returned by [`Event::wait`].
#[must_use = "futures do nothing unless awaited"]
pub struct EventWait<'a, T> {
    registration: Registration<'a, T>,
    at: &'static Location<'static>,
}

impl<T> Future for EventWait<'_, T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<T> {
        let at = self.at;
        self.registration.poll_value(at)
    }
}
