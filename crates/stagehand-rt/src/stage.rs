// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Stages: named execution phases.
//!
//! Each stage owns a FIFO ready queue and a sleep queue ordered by
//! `(wake_time, seq)`. `tick()` promotes due sleepers, then resumes exactly
//! the entries that were ready when the tick began; anything scheduled while
//! the tick runs waits for the next one. That is what keeps a task that
//! reschedules itself every tick from starving the host loop.

use std::cell::RefCell;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::clock::Clock;
use crate::continuation::Continuation;
use crate::trace::{Trace, TraceLog};

/// Identifies a stage. The four built-ins occupy the reserved range; user
/// stages hash their name past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(u32);

impl StageId {
    pub const STARTUP: Self = Self(0);
    pub const UPDATE: Self = Self(1);
    pub const RENDER: Self = Self(2);
    pub const CLEANUP: Self = Self(3);

    /// First id available to user stages.
    const FIRST_CUSTOM: u32 = 4;

    /// Stable id for a user stage: FNV-1a of the name, shifted out of the
    /// reserved range. The same name always maps to the same id.
    pub fn named(name: &str) -> Self {
        let mut hash: u32 = 0x811c_9dc5;
        for byte in name.bytes() {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(0x0100_0193);
        }
        if hash < Self::FIRST_CUSTOM {
            hash += Self::FIRST_CUSTOM;
        }
        Self(hash)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_builtin(self) -> bool {
        self.0 < Self::FIRST_CUSTOM
    }

    pub fn builtin_name(self) -> Option<&'static str> {
        match self {
            Self::STARTUP => Some("startup"),
            Self::UPDATE => Some("update"),
            Self::RENDER => Some("render"),
            Self::CLEANUP => Some("cleanup"),
            _ => None,
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.builtin_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "stage#{:08x}", self.0),
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Continuations resumed.
    pub resumed: usize,
    /// Sleepers moved to the ready queue.
    pub promoted: usize,
    /// Inert continuations dropped without resuming.
    pub discarded: usize,
    /// Milliseconds since the previous tick.
    pub delta: u64,
}

struct ReadyEntry {
    cont: Continuation,
    enqueued_at: &'static Location<'static>,
}

struct SleepEntry {
    wake_time: u64,
    seq: u64,
    cont: Continuation,
}

impl PartialEq for SleepEntry {
    fn eq(&self, other: &Self) -> bool {
        (self.wake_time, self.seq) == (other.wake_time, other.seq)
    }
}

impl Eq for SleepEntry {}

impl PartialOrd for SleepEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SleepEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.wake_time, self.seq).cmp(&(other.wake_time, other.seq))
    }
}

struct Queues {
    current_time: u64,
    previous_time: u64,
    delta: u64,
    ready: VecDeque<ReadyEntry>,
    sleeping: BinaryHeap<Reverse<SleepEntry>>,
    next_seq: u64,
}

/// A named execution phase. Obtain one from `Scheduler::stage`.
pub struct Stage {
    id: StageId,
    name: String,
    clock: Rc<dyn Clock>,
    traces: TraceLog,
    queues: RefCell<Queues>,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queues = self.queues.borrow();
        f.debug_struct("Stage")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("now", &queues.current_time)
            .field("ready", &queues.ready.len())
            .field("sleeping", &queues.sleeping.len())
            .finish()
    }
}

impl Stage {
    pub(crate) fn new(id: StageId, name: String, clock: Rc<dyn Clock>, traces: TraceLog) -> Self {
        let now = clock.now_ms();
        Self {
            id,
            name,
            clock,
            traces,
            queues: RefCell::new(Queues {
                current_time: now,
                previous_time: now,
                delta: 0,
                ready: VecDeque::new(),
                sleeping: BinaryHeap::new(),
                next_seq: 0,
            }),
        }
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical time captured at the start of the latest tick.
    pub fn now(&self) -> u64 {
        self.queues.borrow().current_time
    }

    /// Milliseconds between the latest tick and the one before it.
    pub fn delta(&self) -> u64 {
        self.queues.borrow().delta
    }

    pub fn ready_len(&self) -> usize {
        self.queues.borrow().ready.len()
    }

    pub fn sleeping_len(&self) -> usize {
        self.queues.borrow().sleeping.len()
    }

    /// Queue a continuation for the next tick.
    #[track_caller]
    pub fn schedule(&self, cont: Continuation) {
        self.queues.borrow_mut().ready.push_back(ReadyEntry {
            cont,
            enqueued_at: Location::caller(),
        });
    }

    /// Queue a continuation to become ready `delay_ms` after this stage's
    /// current logical time.
    pub fn schedule_after(&self, cont: Continuation, delay_ms: u64) {
        let mut queues = self.queues.borrow_mut();
        let wake_time = queues.current_time.saturating_add(delay_ms);
        let seq = queues.next_seq;
        queues.next_seq += 1;
        queues.sleeping.push(Reverse(SleepEntry {
            wake_time,
            seq,
            cont,
        }));
    }

    /// Suspend the running task until this stage's next tick.
    #[track_caller]
    pub fn next_tick(&self) -> NextTick<'_> {
        NextTick {
            stage: self,
            at: Location::caller(),
            parked: false,
        }
    }

    /// Suspend the running task for at least `ms` milliseconds of this
    /// stage's logical time. It resumes on the first tick at or past the
    /// deadline.
    #[track_caller]
    pub fn sleep(&self, ms: u64) -> Sleep<'_> {
        Sleep {
            stage: self,
            ms,
            at: Location::caller(),
            parked: false,
        }
    }

    /// Run one tick.
    pub fn tick(&self) -> TickReport {
        let (due, promoted, delta) = {
            let mut queues = self.queues.borrow_mut();
            let now = self.clock.now_ms().max(queues.current_time);
            queues.delta = now - queues.previous_time;
            queues.current_time = now;

            let mut promoted = 0;
            while queues
                .sleeping
                .peek()
                .is_some_and(|Reverse(entry)| entry.wake_time <= now)
            {
                if let Some(Reverse(entry)) = queues.sleeping.pop() {
                    let enqueued_at = entry.cont.suspend_point();
                    queues.ready.push_back(ReadyEntry {
                        cont: entry.cont,
                        enqueued_at,
                    });
                    promoted += 1;
                }
            }
            (queues.ready.len(), promoted, queues.delta)
        };

        let mut report = TickReport {
            promoted,
            delta,
            ..TickReport::default()
        };
        for _ in 0..due {
            // Pop one at a time: resumed tasks schedule onto this queue.
            let Some(entry) = self.queues.borrow_mut().ready.pop_front() else {
                break;
            };
            if entry.cont.is_inert() {
                log::trace!(
                    "[{}] discarding continuation of destroyed task (suspended at {}, queued at {})",
                    self.name,
                    entry.cont.suspend_point(),
                    entry.enqueued_at
                );
                report.discarded += 1;
                continue;
            }
            let label = entry.cont.suspend_point();
            let start = self.clock.now_ms();
            log::trace!("[{}] resuming {} at {}", self.name, entry.cont.task_id(), label);
            entry.cont.resume();
            self.traces.record(Trace {
                label,
                stage: self.id,
                thread: std::thread::current().id(),
                start,
                finish: self.clock.now_ms(),
            });
            report.resumed += 1;
        }

        let mut queues = self.queues.borrow_mut();
        queues.previous_time = queues.current_time;
        report
    }

    /// Destroy every queued task. Used at shutdown, when nothing will ever
    /// tick this stage again. Returns how many continuations were dropped.
    pub fn drain(&self) -> usize {
        let (ready, sleeping) = {
            let mut queues = self.queues.borrow_mut();
            (
                std::mem::take(&mut queues.ready),
                std::mem::take(&mut queues.sleeping),
            )
        };
        let count = ready.len() + sleeping.len();
        for entry in ready {
            entry.cont.destroy();
        }
        for Reverse(entry) in sleeping {
            entry.cont.destroy();
        }
        count
    }
}

/// Future returned by [`Stage::next_tick`].
#[must_use = "futures do nothing unless awaited"]
pub struct NextTick<'a> {
    stage: &'a Stage,
    at: &'static Location<'static>,
    parked: bool,
}

impl Future for NextTick<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.parked {
            return Poll::Ready(());
        }
        let cont = Continuation::capture(self.at);
        self.stage.queues.borrow_mut().ready.push_back(ReadyEntry {
            cont,
            enqueued_at: self.at,
        });
        self.parked = true;
        Poll::Pending
    }
}

/// Future returned by [`Stage::sleep`].
#[must_use = "futures do nothing unless awaited"]
pub struct Sleep<'a> {
    stage: &'a Stage,
    ms: u64,
    at: &'static Location<'static>,
    parked: bool,
}

impl Future for Sleep<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.parked {
            return Poll::Ready(());
        }
        let cont = Continuation::capture(self.at);
        self.stage.schedule_after(cont, self.ms);
        self.parked = true;
        Poll::Pending
    }
}
