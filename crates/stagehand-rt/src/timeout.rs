// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Deadlines on a stage's logical clock.
//!
//! `timeout` hands out a cancellation token that flips after a delay; the
//! consumer polls it between steps of its own work. `with_timeout` is the
//! forcing variant: it races a future against a sleep and drops the future
//! if the sleep wins.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use thiserror::Error;

use crate::cancel::{CancelSource, CancelToken};
use crate::race::Race;
use crate::stage::Stage;
use crate::task::{spawn, Task};

/// Timeout error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation timed out")]
pub struct TimedOut;

/// A token that becomes cancelled once `ms` milliseconds of `stage` time
/// have passed. The timer task sleeps on `stage` and fires on the first
/// tick at or past the deadline.
#[track_caller]
pub fn timeout(stage: &Rc<Stage>, ms: u64) -> CancelToken {
    let source = CancelSource::new();
    let token = source.token();
    let stage = Rc::clone(stage);
    spawn(async move {
        stage.sleep(ms).await;
        log::debug!("[{}] timeout of {}ms fired", stage.name(), ms);
        source.request_stop();
    });
    token
}

/// Run `future` with a deadline of `ms` milliseconds of `stage` time.
/// On expiry the future is dropped and the task yields `Err(TimedOut)`.
pub fn with_timeout<T, F>(stage: Rc<Stage>, ms: u64, future: F) -> Task<Result<T, TimedOut>>
where
    T: 'static,
    F: Future<Output = T> + 'static,
{
    Task::new(async move {
        let slot = Rc::new(RefCell::new(None));
        let race = Race::new();

        let out = Rc::clone(&slot);
        let work = race.spawn(async move {
            let value = future.await;
            *out.borrow_mut() = Some(value);
        });
        let timer = Rc::clone(&stage);
        race.spawn(async move { timer.sleep(ms).await });

        let winner = race.run_on(&stage).await;
        let value = slot.borrow_mut().take();
        match value {
            Some(value) if winner == work => Ok(value),
            _ => Err(TimedOut),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::event::Event;
    use crate::scheduler::Scheduler;
    use crate::stage::StageId;
    use std::cell::Cell;

    #[test]
    fn expired_work_has_no_side_effects() {
        let clock = ManualClock::new();
        let scheduler = Scheduler::with_clock(clock.clone());
        let update = scheduler.stage(StageId::UPDATE);
        let effects = Rc::new(Cell::new(0));
        let outcome = Rc::new(RefCell::new(None));

        let stage = Rc::clone(&update);
        let fx = Rc::clone(&effects);
        let out = Rc::clone(&outcome);
        spawn(async move {
            let work_stage = Rc::clone(&stage);
            let result = with_timeout(stage, 100, async move {
                work_stage.sleep(150).await;
                fx.set(fx.get() + 1);
            })
            .await;
            *out.borrow_mut() = Some(result);
        });

        clock.set(200);
        scheduler.run(StageId::UPDATE);
        scheduler.run(StageId::UPDATE);
        assert_eq!(*outcome.borrow(), Some(Err(TimedOut)));
        assert_eq!(effects.get(), 0);
    }

    #[test]
    fn token_flips_once_deadline_passes() {
        let clock = ManualClock::new();
        let scheduler = Scheduler::with_clock(clock.clone());
        let update = scheduler.stage(StageId::UPDATE);

        let token = timeout(&update, 100);
        assert!(!token.is_cancelled());

        clock.set(99);
        scheduler.run(StageId::UPDATE);
        assert!(!token.is_cancelled());

        clock.set(100);
        scheduler.run(StageId::UPDATE);
        assert!(token.is_cancelled());

        clock.set(500);
        scheduler.run(StageId::UPDATE);
        assert!(token.is_cancelled());
    }

    #[test]
    fn consumer_observes_cancellation_between_sleeps() {
        let clock = ManualClock::new();
        let scheduler = Scheduler::with_clock(clock.clone());
        let update = scheduler.stage(StageId::UPDATE);
        let log = Rc::new(RefCell::new(Vec::new()));

        let stage = Rc::clone(&update);
        let out = Rc::clone(&log);
        spawn(async move {
            let token = timeout(&stage, 3_500);
            for (step, ms) in [1_000, 2_000, 3_000].into_iter().enumerate() {
                stage.sleep(ms).await;
                if token.is_cancelled() {
                    out.borrow_mut().push(format!("cancelled after step {step}"));
                    return;
                }
                out.borrow_mut().push(format!("step {step}"));
            }
        });

        for _ in 0..100 {
            clock.advance(100);
            scheduler.run(StageId::UPDATE);
        }
        assert_eq!(
            *log.borrow(),
            vec!["step 0", "step 1", "cancelled after step 2"]
        );
    }

    #[test]
    fn with_timeout_expires_on_stuck_work() {
        let clock = ManualClock::new();
        let scheduler = Scheduler::with_clock(clock.clone());
        let update = scheduler.stage(StageId::UPDATE);
        let event: Rc<Event<u32>> = Rc::new(Event::new(Rc::clone(&update)));

        let ev = Rc::clone(&event);
        let task = with_timeout(Rc::clone(&update), 50, async move { ev.wait().await });
        let outcome = Rc::new(Cell::new(None));
        let out = Rc::clone(&outcome);
        spawn(async move { out.set(Some(task.await)) });

        for _ in 0..10 {
            clock.advance(10);
            scheduler.run(StageId::UPDATE);
        }
        assert_eq!(outcome.get(), Some(Err(TimedOut)));
        assert_eq!(event.waiting(), 0);
    }

    #[test]
    fn with_timeout_passes_through_value() {
        let clock = ManualClock::new();
        let scheduler = Scheduler::with_clock(clock.clone());
        let update = scheduler.stage(StageId::UPDATE);

        let stage = Rc::clone(&update);
        let task = with_timeout(Rc::clone(&update), 1_000, async move {
            stage.sleep(20).await;
            7
        });
        let outcome = Rc::new(Cell::new(None));
        let out = Rc::clone(&outcome);
        spawn(async move { out.set(Some(task.await)) });

        for _ in 0..10 {
            clock.advance(10);
            scheduler.run(StageId::UPDATE);
        }
        assert_eq!(outcome.get(), Some(Ok(7)));
    }
}
