// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Stagehand runtime: a single-threaded, stage-based coroutine scheduler.
//!
//! Tasks are plain Rust futures. They suspend only at the runtime's own
//! awaitables, each of which parks the task's continuation somewhere
//! explicit: a stage queue, an event, a race, or a bridge record. The host
//! decides when each stage runs; a stage tick resumes what was ready when the
//! tick began.
//!
//! Components:
//! - stage/scheduler: ready and sleep queues, stage registry, stop flag
//! - task/continuation: `Task<T>`, `spawn`, resumable handles
//! - event: broadcast, exclusive and latching events
//! - race: first-to-finish among sibling tasks
//! - timeout/cancel: deadline tokens and `with_timeout`
//! - bridge: completions from worker threads and callback APIs
//! - host: the startup / frame / cleanup driver
//! - trace: per-resumption timing records

pub mod bridge;
pub mod cancel;
pub mod clock;
pub mod config;
pub mod context;
pub mod continuation;
pub mod event;
pub mod host;
pub mod race;
pub mod scheduler;
pub mod stage;
pub mod task;
pub mod timeout;
pub mod trace;

pub use bridge::{Bridge, BridgeError, Completer, RequestId};
pub use cancel::{CancelSource, CancelToken};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::RuntimeConfig;
pub use continuation::Continuation;
pub use event::{Event, EventError, ExclusiveEvent, PermanentEvent};
pub use host::{HostLoop, LoopSummary};
pub use race::{Race, RaceHandle};
pub use scheduler::Scheduler;
pub use stage::{Stage, StageId, TickReport};
pub use task::{spawn, Task, TaskId, TaskState};
pub use timeout::{timeout, with_timeout, TimedOut};
pub use trace::{Trace, TraceLog, TraceSummary};
