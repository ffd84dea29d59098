use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SchedulerError};

pub const DEFAULT_TASK_TYPE: &str = "generic";
pub const DEFAULT_PRIORITY: i64 = 5;
pub const DEFAULT_WORK_MS: u64 = 500;
pub const DEFAULT_CREATED_BY: &str = "student";

/// What a client asks for when submitting a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskSpec {
    #[serde(rename = "type")]
    pub task_type: String,
    pub priority: i64,
    #[serde(alias = "workAmount")]
    pub work_ms: u64,
    pub created_by: String,
}

impl Default for TaskSpec {
    fn default() -> Self {
        Self {
            task_type: DEFAULT_TASK_TYPE.to_string(),
            priority: DEFAULT_PRIORITY,
            work_ms: DEFAULT_WORK_MS,
            created_by: DEFAULT_CREATED_BY.to_string(),
        }
    }
}

impl TaskSpec {
    pub fn new(task_type: impl Into<String>, priority: i64, work_ms: u64) -> Self {
        Self {
            task_type: task_type.into(),
            priority,
            work_ms,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.work_ms == 0 {
            return Err(SchedulerError::InvalidRequest(
                "workMs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A unit of simulated work.
///
/// `remaining_ms` only ever decreases, and `completed_ts` is set exactly once,
/// at the moment `remaining_ms` reaches zero.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub task_type: String,
    pub priority: i64,
    pub created_by: String,
    pub arrival_ts: DateTime<Utc>,
    /// Admission order within one dispatcher. Breaks ties between equal timestamps.
    pub arrival_seq: u64,
    pub work_ms: u64,
    remaining_ms: u64,
    started: bool,
    dispatches: u32,
    completed_ts: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(arrival_seq: u64, spec: TaskSpec) -> Self {
        Self::with_arrival(arrival_seq, spec, Utc::now())
    }

    pub fn with_arrival(arrival_seq: u64, spec: TaskSpec, arrival_ts: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: spec.task_type,
            priority: spec.priority,
            created_by: spec.created_by,
            arrival_ts,
            arrival_seq,
            work_ms: spec.work_ms,
            remaining_ms: spec.work_ms,
            started: false,
            dispatches: 0,
            completed_ts: None,
        }
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn started(&self) -> bool {
        self.started
    }

    /// Number of times this task has been handed to a worker.
    pub fn dispatches(&self) -> u32 {
        self.dispatches
    }

    pub fn completed_ts(&self) -> Option<DateTime<Utc>> {
        self.completed_ts
    }

    pub fn is_complete(&self) -> bool {
        self.remaining_ms == 0
    }

    pub fn mark_dispatched(&mut self) {
        self.started = true;
        self.dispatches += 1;
    }

    /// Subtract work reported by a worker. Returns true when this call
    /// finished the task.
    pub fn apply_progress(&mut self, consumed_ms: u64, now: DateTime<Utc>) -> bool {
        if self.is_complete() {
            return false;
        }
        self.remaining_ms = self.remaining_ms.saturating_sub(consumed_ms);
        if self.remaining_ms == 0 {
            self.completed_ts = Some(now);
            true
        } else {
            false
        }
    }
}
