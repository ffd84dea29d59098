use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::scheduler::task::Task;

/// A finished task as recorded in the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTask {
    pub id: Uuid,
    pub task_type: String,
    pub priority: i64,
    pub created_by: String,
    pub arrival_ts: DateTime<Utc>,
    pub completed_ts: DateTime<Utc>,
    pub work_ms: u64,
    pub dispatches: u32,
}

impl CompletedTask {
    pub fn latency_ms(&self) -> i64 {
        (self.completed_ts - self.arrival_ts).num_milliseconds()
    }
}

/// Append-only record of finished tasks plus the lifetime counters.
///
/// Entries are kept in completion order and trimmed from the oldest end once
/// `retention` is exceeded. The counters never decrease.
#[derive(Debug)]
pub struct CompletionLedger {
    entries: VecDeque<CompletedTask>,
    retention: usize,
    completed_total: u64,
    dropped_total: u64,
    failed_total: u64,
}

impl CompletionLedger {
    pub fn new(retention: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            retention,
            completed_total: 0,
            dropped_total: 0,
            failed_total: 0,
        }
    }

    /// Record a task whose remaining work has reached zero.
    ///
    /// Returns `None` (and records nothing) if the task is not complete.
    pub fn record_completion(&mut self, task: Task) -> Option<&CompletedTask> {
        let completed_ts = task.completed_ts()?;
        let dispatches = task.dispatches();
        self.entries.push_back(CompletedTask {
            id: task.id,
            task_type: task.task_type,
            priority: task.priority,
            created_by: task.created_by,
            arrival_ts: task.arrival_ts,
            completed_ts,
            work_ms: task.work_ms,
            dispatches,
        });
        self.completed_total += 1;
        while self.entries.len() > self.retention {
            self.entries.pop_front();
        }
        self.entries.back()
    }

    pub fn record_drop(&mut self) {
        self.dropped_total += 1;
    }

    /// Account for a task lost to a worker fault.
    pub fn record_failure(&mut self) {
        self.failed_total += 1;
    }

    pub fn completed_total(&self) -> u64 {
        self.completed_total
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total
    }

    pub fn failed_total(&self) -> u64 {
        self.failed_total
    }

    /// Number of entries currently retained.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.entries.iter().any(|entry| entry.id == *id)
    }

    /// The newest `limit` completions, oldest first.
    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &CompletedTask> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip)
    }
}
