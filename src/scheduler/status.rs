use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::scheduler::ledger::CompletedTask;
use crate::scheduler::queue::SchedulingPolicy;
use crate::scheduler::task::Task;
use crate::worker::pool::WorkerView;

/// Point-in-time view of the scheduler. Building one never mutates state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub scheduler: SchedulingPolicy,
    pub threads: usize,
    pub quantum_ms: Option<u64>,
    pub queue_size: usize,
    pub queue: Vec<QueuedTaskStatus>,
    pub workers: Vec<WorkerStatus>,
    pub running: usize,
    pub completed: u64,
    pub dropped: u64,
    pub failed: u64,
    pub recent_completed: Vec<CompletedTaskStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedTaskStatus {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub task_type: String,
    pub priority: i64,
    pub remaining_ms: u64,
    #[serde(with = "ts_milliseconds")]
    pub arrival_ts: DateTime<Utc>,
}

impl From<&Task> for QueuedTaskStatus {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            task_type: task.task_type.clone(),
            priority: task.priority,
            remaining_ms: task.remaining_ms(),
            arrival_ts: task.arrival_ts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    pub id: String,
    pub busy: bool,
    pub task_id: Option<Uuid>,
    #[serde(with = "ts_milliseconds")]
    pub since: DateTime<Utc>,
}

impl From<WorkerView> for WorkerStatus {
    fn from(view: WorkerView) -> Self {
        Self {
            id: view.name(),
            busy: view.busy,
            task_id: view.task_id,
            since: view.since,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTaskStatus {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(with = "ts_milliseconds")]
    pub arrival_ts: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub completed_ts: DateTime<Utc>,
    pub latency_ms: i64,
    pub dispatches: u32,
}

impl From<&CompletedTask> for CompletedTaskStatus {
    fn from(entry: &CompletedTask) -> Self {
        Self {
            id: entry.id,
            task_type: entry.task_type.clone(),
            arrival_ts: entry.arrival_ts,
            completed_ts: entry.completed_ts,
            latency_ms: entry.latency_ms(),
            dispatches: entry.dispatches,
        }
    }
}
