// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Cooperative cancellation.
//!
//! A `CancelSource` owns the right to request a stop; any number of
//! `CancelToken`s observe it. The flag is an `Arc<AtomicBool>` so tokens
//! can be handed to worker threads, but nothing here ever blocks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Write side of a cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelSource {
    flag: Arc<AtomicBool>,
}

impl CancelSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns `true` only for the call that flipped it.
    pub fn request_stop(&self) -> bool {
        !self.flag.swap(true, Ordering::AcqRel)
    }

    pub fn stop_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// A read-only view of this source's flag.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            flag: Arc::clone(&self.flag),
        }
    }
}

/// Read side of a cancellation flag. Once it reports cancelled it stays
/// cancelled.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token with no source; it is never cancelled.
    pub fn never() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_observes_source() {
        let source = CancelSource::new();
        let token = source.token();
        assert!(!token.is_cancelled());
        assert!(source.request_stop());
        assert!(token.is_cancelled());
    }

    #[test]
    fn request_stop_is_idempotent() {
        let source = CancelSource::new();
        assert!(source.request_stop());
        assert!(!source.request_stop());
        assert!(source.stop_requested());
        assert!(source.token().is_cancelled());
    }

    #[test]
    fn token_crosses_threads() {
        let source = CancelSource::new();
        let token = source.token();
        let handle = std::thread::spawn(move || {
            while !token.is_cancelled() {
                std::thread::yield_now();
            }
        });
        source.request_stop();
        handle.join().unwrap();
    }

    #[test]
    fn never_token_stays_clear() {
        assert!(!CancelToken::never().is_cancelled());
    }
}
