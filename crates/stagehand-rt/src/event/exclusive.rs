// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Single-waiter event.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use super::waitlist::{Registration, WaitList};
use super::EventError;
use crate::stage::Stage;

/// Repeatable event with room for one waiter. While the slot is taken,
/// further waits resolve to `Err(EventError::Occupied)` without suspending
/// and the current occupant keeps its place.
pub struct ExclusiveEvent<T> {
    stage: Rc<Stage>,
    slot: RefCell<WaitList<T>>,
}

impl<T> fmt::Debug for ExclusiveEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusiveEvent")
            .field("stage", &self.stage.id())
            .field("occupied", &self.is_occupied())
            .finish()
    }
}

impl<T> ExclusiveEvent<T> {
    pub fn new(stage: Rc<Stage>) -> Self {
        Self {
            stage,
            slot: RefCell::new(WaitList::new()),
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.slot.borrow().waiting() > 0
    }

    #[track_caller]
    pub fn wait(&self) -> ExclusiveWait<'_, T> {
        ExclusiveWait {
            registration: Registration::new(&self.slot),
            at: Location::caller(),
        }
    }

    /// Wake the occupant, if any, with `value` and free the slot.
    #[track_caller]
    pub fn trigger(&self, value: T) -> bool {
        let occupant = self.slot.borrow_mut().notify_next(value);
        match occupant {
            Some(cont) => {
                self.stage.schedule(cont);
                true
            }
            None => false,
        }
    }
}

/// Future returned by [`ExclusiveEvent::wait`].
#[must_use = "futures do nothing unless awaited"]
pub struct ExclusiveWait<'a, T> {
    registration: Registration<'a, T>,
    at: &'static Location<'static>,
}

impl<T> Future for ExclusiveWait<'_, T> {
    type Output = Result<T, EventError>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let at = self.at;
        if !self.registration.is_registered() && self.registration.list().borrow().waiting() > 0 {
            log::debug!("exclusive event at {} rejected a second waiter", at);
            return Poll::Ready(Err(EventError::Occupied));
        }
        self.registration.poll_value(at).map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::scheduler::Scheduler;
    use crate::stage::StageId;
    use crate::task::spawn;

    type Outcomes = Rc<RefCell<Vec<Result<u32, EventError>>>>;

    fn waiter(event: &Rc<ExclusiveEvent<u32>>, outcomes: &Outcomes) {
        let event = Rc::clone(event);
        let outcomes = Rc::clone(outcomes);
        spawn(async move {
            let outcome = event.wait().await;
            outcomes.borrow_mut().push(outcome);
        });
    }

    #[test]
    fn second_waiter_is_rejected_and_first_kept() {
        let scheduler = Scheduler::with_clock(ManualClock::new());
        let event = Rc::new(ExclusiveEvent::new(scheduler.stage(StageId::UPDATE)));
        let outcomes: Outcomes = Rc::default();

        waiter(&event, &outcomes);
        assert!(event.is_occupied());
        waiter(&event, &outcomes);
        assert_eq!(*outcomes.borrow(), vec![Err(EventError::Occupied)]);

        assert!(event.trigger(9));
        scheduler.run(StageId::UPDATE);
        assert_eq!(
            *outcomes.borrow(),
            vec![Err(EventError::Occupied), Ok(9)]
        );
    }

    #[test]
    fn trigger_without_waiter_is_a_noop() {
        let scheduler = Scheduler::with_clock(ManualClock::new());
        let event: ExclusiveEvent<u32> = ExclusiveEvent::new(scheduler.stage(StageId::UPDATE));
        assert!(!event.trigger(1));
        assert!(!event.is_occupied());
    }

    #[test]
    fn slot_frees_after_trigger() {
        let scheduler = Scheduler::with_clock(ManualClock::new());
        let event = Rc::new(ExclusiveEvent::new(scheduler.stage(StageId::UPDATE)));
        let outcomes: Outcomes = Rc::default();

        waiter(&event, &outcomes);
        event.trigger(1);
        assert!(!event.is_occupied());
        waiter(&event, &outcomes);
        assert!(event.is_occupied());
        event.trigger(2);

        scheduler.run(StageId::UPDATE);
        assert_eq!(*outcomes.borrow(), vec![Ok(1), Ok(2)]);
    }
}
