// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Events: tasks park on them, triggers move the parked continuations onto
//! the event's stage for its next tick.
//!
//! - `Event<T>`: broadcast; every current waiter gets a clone of the value.
//! - `ExclusiveEvent<T>`: one waiter slot; a second concurrent waiter is
//!   turned away with `EventError::Occupied`.
//! - `PermanentEvent`: a latch; once triggered, waits complete at once.
//!
//! Triggers never run waiters inline. Each waiter sees the value of the
//! trigger that woke it, even if another trigger fires before it resumes.

mod broadcast;
mod exclusive;
mod permanent;
mod waitlist;

use thiserror::Error;

pub use broadcast::{Event, EventWait};
pub use exclusive::{ExclusiveEvent, ExclusiveWait};
pub use permanent::{PermanentEvent, PermanentWait};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("exclusive event already has a waiter")]
    Occupied,
}
