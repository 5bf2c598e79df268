// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! End-to-end scheduling behaviour: tick snapshots, sleep order, events,
//! races and timeouts driven through the public API with a manual clock.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use stagehand_rt::{
    spawn, timeout, Continuation, Event, ManualClock, PermanentEvent, Race, Scheduler, Stage,
    StageId,
};

/// Minimal custom awaitable: parks the running task on a stage, either for
/// the next tick or after a delay.
struct Park<'a> {
    stage: &'a Stage,
    delay: Option<u64>,
    parked: bool,
}

impl Future for Park<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.parked {
            return Poll::Ready(());
        }
        let cont = Continuation::current();
        match self.delay {
            Some(ms) => self.stage.schedule_after(cont, ms),
            None => self.stage.schedule(cont),
        }
        self.parked = true;
        Poll::Pending
    }
}

fn park(stage: &Stage, delay: Option<u64>) -> Park<'_> {
    Park {
        stage,
        delay,
        parked: false,
    }
}

fn setup() -> (Rc<Scheduler>, ManualClock, Rc<Stage>) {
    let clock = ManualClock::new();
    let scheduler = Rc::new(Scheduler::with_clock(clock.clone()));
    let update = scheduler.stage(StageId::UPDATE);
    (scheduler, clock, update)
}

#[test]
fn scheduled_continuation_resumes_once() {
    let (_scheduler, _clock, update) = setup();
    let hits = Rc::new(Cell::new(0));

    let stage = Rc::clone(&update);
    let counter = Rc::clone(&hits);
    spawn(async move {
        park(&stage, None).await;
        counter.set(counter.get() + 1);
    });
    assert_eq!(update.ready_len(), 1);

    let report = update.tick();
    assert_eq!(report.resumed, 1);
    assert_eq!(hits.get(), 1);
    assert_eq!(update.ready_len(), 0);
}

#[test]
fn delayed_continuation_respects_deadline() {
    let (_scheduler, clock, update) = setup();
    let hits = Rc::new(Cell::new(0));

    let stage = Rc::clone(&update);
    let counter = Rc::clone(&hits);
    spawn(async move {
        park(&stage, Some(100)).await;
        counter.set(counter.get() + 1);
    });

    clock.set(50);
    assert_eq!(update.tick().resumed, 0);
    assert_eq!(hits.get(), 0);

    clock.set(150);
    assert_eq!(update.tick().resumed, 1);
    assert_eq!(hits.get(), 1);
}

#[test]
fn every_ready_task_runs_exactly_once_per_tick() {
    for tasks in [1usize, 2, 7, 32] {
        let (_scheduler, _clock, update) = setup();
        let runs: Vec<Rc<Cell<u32>>> = (0..tasks).map(|_| Rc::new(Cell::new(0))).collect();

        for counter in &runs {
            let stage = Rc::clone(&update);
            let counter = Rc::clone(counter);
            spawn(async move {
                loop {
                    stage.next_tick().await;
                    counter.set(counter.get() + 1);
                }
            });
        }

        for tick in 1..=4 {
            let report = update.tick();
            assert_eq!(report.resumed, tasks);
            assert!(runs.iter().all(|c| c.get() == tick));
            assert_eq!(update.ready_len(), tasks);
        }
        update.drain();
    }
}

#[test]
fn task_spawned_during_tick_waits_for_next_tick() {
    let (_scheduler, _clock, update) = setup();
    let child_runs = Rc::new(Cell::new(0));

    let stage = Rc::clone(&update);
    let runs = Rc::clone(&child_runs);
    spawn(async move {
        stage.next_tick().await;
        let inner = Rc::clone(&stage);
        let counter = Rc::clone(&runs);
        spawn(async move {
            counter.set(counter.get() + 1);
            inner.next_tick().await;
            counter.set(counter.get() + 1);
        });
    });

    update.tick();
    assert_eq!(child_runs.get(), 1);
    assert_eq!(update.ready_len(), 1);
    update.tick();
    assert_eq!(child_runs.get(), 2);
}

#[test]
fn due_sleepers_resume_in_wake_order() {
    let (_scheduler, clock, update) = setup();
    let order = Rc::new(RefCell::new(Vec::new()));
    let delays = [40u64, 5, 25, 5, 60, 0, 25];

    for (index, &ms) in delays.iter().enumerate() {
        let stage = Rc::clone(&update);
        let order = Rc::clone(&order);
        spawn(async move {
            stage.sleep(ms).await;
            order.borrow_mut().push((ms, index));
        });
    }

    clock.set(60);
    update.tick();

    let mut expected: Vec<(u64, usize)> = delays.iter().copied().zip(0..).collect();
    expected.sort();
    assert_eq!(*order.borrow(), expected);
}

#[test]
fn broadcast_reaches_only_registered_waiters() {
    let (_scheduler, _clock, update) = setup();
    let event: Rc<Event<&'static str>> = Rc::new(Event::new(Rc::clone(&update)));
    let seen = Rc::new(RefCell::new(Vec::new()));

    for _ in 0..3 {
        let event = Rc::clone(&event);
        let seen = Rc::clone(&seen);
        spawn(async move {
            let value = event.wait().await;
            seen.borrow_mut().push(value);
        });
    }
    assert_eq!(event.trigger("go"), 3);
    assert_eq!(event.waiting(), 0);

    let late = Rc::new(Cell::new(false));
    let flag = Rc::clone(&late);
    let ev = Rc::clone(&event);
    spawn(async move {
        ev.wait().await;
        flag.set(true);
    });

    update.tick();
    assert_eq!(*seen.borrow(), vec!["go", "go", "go"]);
    assert!(!late.get());
    assert_eq!(event.waiting(), 1);
}

#[test]
fn latch_resolves_every_later_wait_immediately() {
    let (_scheduler, _clock, update) = setup();
    let latch = Rc::new(PermanentEvent::new(Rc::clone(&update)));
    latch.trigger();

    let done = Rc::new(Cell::new(0));
    for _ in 0..10 {
        let latch = Rc::clone(&latch);
        let done = Rc::clone(&done);
        spawn(async move {
            latch.wait().await;
            latch.wait().await;
            done.set(done.get() + 1);
        });
    }
    assert_eq!(done.get(), 10);
    assert_eq!(update.ready_len(), 0);
}

#[test]
fn race_winner_is_reported_once_and_losers_go_quiet() {
    let (_scheduler, clock, update) = setup();
    let work = Rc::new(RefCell::new(Vec::new()));

    let race = Race::new();
    for (id, ms) in [(0u32, 300u64), (1, 100), (2, 200)] {
        let stage = Rc::clone(&update);
        let work = Rc::clone(&work);
        race.spawn(async move {
            loop {
                stage.sleep(10).await;
                work.borrow_mut().push(id);
                if stage.now() >= ms {
                    break;
                }
            }
        });
    }

    let results = Rc::new(RefCell::new(Vec::new()));
    let out = Rc::clone(&results);
    let stage = Rc::clone(&update);
    spawn(async move {
        let winner = race.run_on(&stage).await;
        out.borrow_mut().push(winner);
    });

    for _ in 0..40 {
        clock.advance(10);
        update.tick();
    }
    assert_eq!(*results.borrow(), vec![1]);

    let after_win = work.borrow().len();
    for _ in 0..10 {
        clock.advance(10);
        update.tick();
    }
    assert_eq!(work.borrow().len(), after_win);
}

#[test]
fn timeout_token_never_reverts() {
    let (_scheduler, clock, update) = setup();
    let token = timeout(&update, 30);

    let mut observed = Vec::new();
    for _ in 0..10 {
        clock.advance(10);
        update.tick();
        observed.push(token.is_cancelled());
    }
    let first = observed.iter().position(|&c| c).unwrap();
    assert_eq!(first, 2);
    assert!(observed[first..].iter().all(|&c| c));
}

#[test]
fn traces_label_await_sites() {
    let (scheduler, _clock, update) = setup();
    let stage = Rc::clone(&update);
    spawn(async move {
        stage.next_tick().await;
    });
    update.tick();

    let traces = scheduler.traces().snapshot();
    assert_eq!(traces.len(), 1);
    assert!(traces[0].label.file().ends_with("scheduling.rs"));
    assert_eq!(traces[0].stage, StageId::UPDATE);
}
