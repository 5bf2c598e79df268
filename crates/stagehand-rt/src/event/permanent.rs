// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Latching event.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use super::waitlist::{Registration, WaitList};
use crate::stage::Stage;

/// One-shot latch. Before the trigger, waiters suspend; the trigger wakes
/// them all and every later wait completes without suspending.
pub struct PermanentEvent {
    stage: Rc<Stage>,
    latched: Cell<bool>,
    waiters: RefCell<WaitList<()>>,
}

impl fmt::Debug for PermanentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermanentEvent")
            .field("stage", &self.stage.id())
            .field("latched", &self.latched.get())
            .field("waiting", &self.waiters.borrow().waiting())
            .finish()
    }
}

impl PermanentEvent {
    pub fn new(stage: Rc<Stage>) -> Self {
        Self {
            stage,
            latched: Cell::new(false),
            waiters: RefCell::new(WaitList::new()),
        }
    }

    pub fn is_set(&self) -> bool {
        self.latched.get()
    }

    #[track_caller]
    pub fn wait(&self) -> PermanentWait<'_> {
        PermanentWait {
            event: self,
            registration: Registration::new(&self.waiters),
            at: Location::caller(),
        }
    }

    /// Latch the event and wake everyone waiting. Returns how many were
    /// woken; later calls wake nobody.
    #[track_caller]
    pub fn trigger(&self) -> usize {
        self.latched.set(true);
        let woken: Vec<_> = {
            let mut waiters = self.waiters.borrow_mut();
            std::iter::from_fn(|| waiters.notify_next(())).collect()
        };
        let count = woken.len();
        for cont in woken {
            self.stage.schedule(cont);
        }
        count
    }
}

/// Future returned by [`PermanentEvent::wait`].
#[must_use = "futures do nothing unless awaited"]
pub struct PermanentWait<'a> {
    event: &'a PermanentEvent,
    registration: Registration<'a, ()>,
    at: &'static Location<'static>,
}

impl Future for PermanentWait<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if !self.registration.is_registered() && self.event.is_set() {
            return Poll::Ready(());
        }
        let at = self.at;
        self.registration.poll_value(at)
    }
}
