// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Per-resumption trace records.
//!
//! Every time a stage resumes a continuation it appends a `Trace` to the
//! scheduler's `TraceLog`. The log is a bounded ring buffer: once full, the
//! oldest record is dropped. Readers take snapshots and never touch
//! scheduler state.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::panic::Location;
use std::rc::Rc;
use std::thread::ThreadId;

use crate::stage::StageId;

/// One resumption: which await site was resumed, on which stage, and for
/// how long (in clock milliseconds).
#[derive(Debug, Clone)]
pub struct Trace {
    pub label: &'static Location<'static>,
    pub stage: StageId,
    pub thread: ThreadId,
    pub start: u64,
    pub finish: u64,
}

impl Trace {
    pub fn duration(&self) -> u64 {
        self.finish.saturating_sub(self.start)
    }
}

/// Aggregate of all traces sharing one await-site label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSummary {
    pub label: String,
    pub count: usize,
    pub total_ms: u64,
    pub max_ms: u64,
}

/// Shared, bounded trace buffer. Clones refer to the same buffer.
/// A capacity of zero disables recording.
#[derive(Debug, Clone)]
pub struct TraceLog {
    records: Rc<RefCell<VecDeque<Trace>>>,
    capacity: usize,
}

impl TraceLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Rc::new(RefCell::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&self, trace: Trace) {
        if self.capacity == 0 {
            return;
        }
        let mut records = self.records.borrow_mut();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(trace);
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.records.borrow_mut().clear();
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<Trace> {
        self.records.borrow().iter().cloned().collect()
    }

    /// Per-label totals, busiest label first (ties by label).
    pub fn summarize(&self) -> Vec<TraceSummary> {
        let mut by_label: BTreeMap<String, TraceSummary> = BTreeMap::new();
        for trace in self.records.borrow().iter() {
            let label = format!("{}:{}", trace.label.file(), trace.label.line());
            let entry = by_label
                .entry(label.clone())
                .or_insert_with(|| TraceSummary {
                    label,
                    count: 0,
                    total_ms: 0,
                    max_ms: 0,
                });
            entry.count += 1;
            entry.total_ms += trace.duration();
            entry.max_ms = entry.max_ms.max(trace.duration());
        }
        let mut summary: Vec<TraceSummary> = by_label.into_values().collect();
        summary.sort_by(|a, b| {
            b.total_ms
                .cmp(&a.total_ms)
                .then(b.count.cmp(&a.count))
                .then_with(|| a.label.cmp(&b.label))
        });
        summary
    }
}

impl Default for TraceLog {
    fn default() -> Self {
        Self::with_capacity(4096)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn trace_here(start: u64, finish: u64) -> Trace {
        Trace {
            label: Location::caller(),
            stage: StageId::UPDATE,
            thread: std::thread::current().id(),
            start,
            finish,
        }
    }

    #[test]
    fn ring_buffer_drops_oldest() {
        let log = TraceLog::with_capacity(2);
        log.record(trace_here(0, 1));
        log.record(trace_here(1, 2));
        log.record(trace_here(2, 3));
        let starts: Vec<u64> = log.snapshot().iter().map(|t| t.start).collect();
        assert_eq!(starts, vec![1, 2]);
    }

    #[test]
    fn zero_capacity_records_nothing() {
        let log = TraceLog::with_capacity(0);
        log.record(trace_here(0, 1));
        assert!(log.is_empty());
    }

    #[test]
    fn summarize_groups_by_label() {
        let log = TraceLog::with_capacity(16);
        for i in 0..3 {
            log.record(trace_here(i, i + 2));
        }
        log.record(trace_here(10, 11));

        let summary = log.summarize();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].count, 3);
        assert_eq!(summary[0].total_ms, 6);
        assert_eq!(summary[0].max_ms, 2);
        assert_eq!(summary[1].count, 1);
        assert!(summary[0].label.contains("trace.rs"));
    }

    #[test]
    fn clones_share_records() {
        let log = TraceLog::with_capacity(4);
        let view = log.clone();
        log.record(trace_here(0, 0));
        assert_eq!(view.len(), 1);
        view.clear();
        assert!(log.is_empty());
    }
}
