// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Race: first candidate to finish wins.
//!
//! A race owns its candidates and a private ready queue. `step()` resumes
//! the candidates queued at the moment it is called, the same snapshot rule
//! a stage tick follows. As soon as one candidate completes, every other
//! unfinished candidate is destroyed: its future is dropped, which releases
//! whatever it was parked on (event slots, bridge records), and any
//! continuation of it still sitting in a stage queue becomes inert.
//!
//! Candidates must therefore be safe to abort at every await point.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::continuation::Continuation;
use crate::stage::Stage;
use crate::task::{RawTask, Task};

struct Member {
    id: u32,
    task: Rc<RawTask>,
}

struct RaceInner {
    candidates: RefCell<VecDeque<Continuation>>,
    members: RefCell<Vec<Member>>,
    winner: Cell<Option<u32>>,
    next_id: Cell<u32>,
}

impl RaceInner {
    /// Record `id` as the winner and destroy every other candidate on the
    /// spot. Only the winner is running here, so each loser is parked
    /// somewhere; its continuation goes inert wherever it sits.
    fn finish(&self, id: u32) {
        if self.winner.get().is_some() {
            return;
        }
        log::debug!("race won by candidate {}", id);
        self.winner.set(Some(id));
        let losers: Vec<Rc<RawTask>> = self
            .members
            .borrow()
            .iter()
            .filter(|member| member.id != id)
            .map(|member| Rc::clone(&member.task))
            .collect();
        for task in losers {
            task.destroy();
        }
    }
}

/// A set of competing tasks. Dropping it destroys every unfinished
/// candidate.
pub struct Race {
    inner: Rc<RaceInner>,
}

/// Handle a candidate keeps to suspend back to its race.
#[derive(Clone)]
pub struct RaceHandle {
    inner: Rc<RaceInner>,
}

impl fmt::Debug for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Race")
            .field("candidates", &self.inner.members.borrow().len())
            .field("queued", &self.inner.candidates.borrow().len())
            .field("winner", &self.inner.winner.get())
            .finish()
    }
}

impl fmt::Debug for RaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RaceHandle")
            .field("winner", &self.inner.winner.get())
            .finish()
    }
}

impl Race {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RaceInner {
                candidates: RefCell::new(VecDeque::new()),
                members: RefCell::new(Vec::new()),
                winner: Cell::new(None),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Build a race with `build`, then run it on `stage`. The returned task
    /// yields the winner id.
    pub fn scope<B>(stage: Rc<Stage>, build: B) -> Task<u32>
    where
        B: FnOnce(&Race),
    {
        let race = Race::new();
        build(&race);
        Task::new(async move { race.run_on(&stage).await })
    }

    /// Register a candidate and return its id (0, 1, ... in registration
    /// order). The candidate does not run until the race steps.
    #[track_caller]
    pub fn spawn<F>(&self, future: F) -> u32
    where
        F: Future<Output = ()> + 'static,
    {
        let at = Location::caller();
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);

        let race = Rc::downgrade(&self.inner);
        let task = RawTask::new(
            Box::pin(async move {
                future.await;
                if let Some(race) = race.upgrade() {
                    race.finish(id);
                }
            }),
            at,
        );
        self.inner.members.borrow_mut().push(Member {
            id,
            task: Rc::clone(&task),
        });
        self.inner
            .candidates
            .borrow_mut()
            .push_back(Continuation::new(task, at));
        id
    }

    pub fn handle(&self) -> RaceHandle {
        RaceHandle {
            inner: Rc::clone(&self.inner),
        }
    }

    pub fn winner(&self) -> Option<u32> {
        self.inner.winner.get()
    }

    /// Candidates registered and not yet torn down.
    pub fn len(&self) -> usize {
        self.inner.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resume the currently queued candidates once each, stopping early
    /// when one of them wins. Returns the winner once there is one.
    ///
    /// Panics if no candidate was ever registered.
    pub fn step(&self) -> Option<u32> {
        if let Some(winner) = self.inner.winner.get() {
            self.teardown(Some(winner));
            return Some(winner);
        }
        if self.inner.members.borrow().is_empty() {
            panic!("stepped a race with no candidates; it can never produce a winner");
        }

        let due = self.inner.candidates.borrow().len();
        for _ in 0..due {
            if self.inner.winner.get().is_some() {
                break;
            }
            let Some(cont) = self.inner.candidates.borrow_mut().pop_front() else {
                break;
            };
            if cont.is_inert() {
                continue;
            }
            cont.resume();
        }

        let winner = self.inner.winner.get()?;
        self.teardown(Some(winner));
        Some(winner)
    }

    /// Step once per tick of `stage` until a candidate wins.
    pub fn run_on<'a>(&'a self, stage: &'a Stage) -> RunOn<'a> {
        RunOn { race: self, stage }
    }

    fn teardown(&self, winner: Option<u32>) {
        let queued: Vec<Continuation> = self.inner.candidates.borrow_mut().drain(..).collect();
        drop(queued);
        let members = std::mem::take(&mut *self.inner.members.borrow_mut());
        for member in members {
            if Some(member.id) != winner {
                member.task.destroy();
            }
        }
    }
}

impl Default for Race {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Race {
    fn drop(&mut self) {
        self.teardown(self.inner.winner.get());
    }
}

impl RaceHandle {
    /// Suspend the running candidate until the race's next `step`.
    #[track_caller]
    pub fn yield_now(&self) -> RaceYield<'_> {
        RaceYield {
            inner: &self.inner,
            at: Location::caller(),
            parked: false,
        }
    }
}

/// Future returned by [`RaceHandle::yield_now`].
#[must_use = "futures do nothing unless awaited"]
pub struct RaceYield<'a> {
    inner: &'a RaceInner,
    at: &'static Location<'static>,
    parked: bool,
}

impl Future for RaceYield<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.parked {
            return Poll::Ready(());
        }
        let cont = Continuation::capture(self.at);
        self.inner.candidates.borrow_mut().push_back(cont);
        self.parked = true;
        Poll::Pending
    }
}

/// Future returned by [`Race::run_on`].
#[must_use = "futures do nothing unless awaited"]
pub struct RunOn<'a> {
    race: &'a Race,
    stage: &'a Stage,
}

impl Future for RunOn<'_> {
    type Output = u32;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<u32> {
        match self.race.step() {
            Some(winner) => Poll::Ready(winner),
            None => {
                self.stage.schedule(Continuation::capture(Location::caller()));
                Poll::Pending
            }
        }
    }
}
