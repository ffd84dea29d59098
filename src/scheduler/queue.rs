use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;
use crate::scheduler::task::Task;

/// Ordering rule used to pick the next queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulingPolicy {
    Fcfs,
    Priority,
    RoundRobin,
}

impl SchedulingPolicy {
    pub const ALL: [SchedulingPolicy; 3] = [
        SchedulingPolicy::Fcfs,
        SchedulingPolicy::Priority,
        SchedulingPolicy::RoundRobin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulingPolicy::Fcfs => "FCFS",
            SchedulingPolicy::Priority => "PRIORITY",
            SchedulingPolicy::RoundRobin => "ROUND_ROBIN",
        }
    }

    /// Build an empty queue implementing this policy.
    pub fn new_queue(&self) -> Box<dyn SchedulingQueue> {
        match self {
            SchedulingPolicy::Fcfs => Box::new(FcfsQueue::default()),
            SchedulingPolicy::Priority => Box::new(PriorityQueue::default()),
            SchedulingPolicy::RoundRobin => Box::new(RoundRobinQueue::default()),
        }
    }
}

impl fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulingPolicy {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SchedulingPolicy::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| SchedulerError::InvalidPolicy(s.to_string()))
    }
}

/// Pending tasks, ordered by a scheduling policy.
///
/// Every implementation owns its tasks outright; callers only ever see shared
/// borrows, so the ordering cannot be disturbed from outside.
pub trait SchedulingQueue: Send {
    fn policy(&self) -> SchedulingPolicy;

    fn admit(&mut self, task: Task);

    fn remove_next(&mut self) -> Option<Task>;

    fn peek_next(&self) -> Option<&Task>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queued tasks in the order they would be removed.
    fn snapshot(&self) -> Vec<&Task>;
}

/// Strict arrival order.
#[derive(Debug, Default)]
pub struct FcfsQueue {
    tasks: VecDeque<Task>,
}

impl SchedulingQueue for FcfsQueue {
    fn policy(&self) -> SchedulingPolicy {
        SchedulingPolicy::Fcfs
    }

    fn admit(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    fn remove_next(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    fn peek_next(&self) -> Option<&Task> {
        self.tasks.front()
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }

    fn snapshot(&self) -> Vec<&Task> {
        self.tasks.iter().collect()
    }
}

/// FIFO across quanta: a preempted task is re-admitted at the tail.
#[derive(Debug, Default)]
pub struct RoundRobinQueue {
    tasks: VecDeque<Task>,
}

impl SchedulingQueue for RoundRobinQueue {
    fn policy(&self) -> SchedulingPolicy {
        SchedulingPolicy::RoundRobin
    }

    fn admit(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    fn remove_next(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    fn peek_next(&self) -> Option<&Task> {
        self.tasks.front()
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }

    fn snapshot(&self) -> Vec<&Task> {
        self.tasks.iter().collect()
    }
}

type PriorityKey = (i64, DateTime<Utc>, u64);

/// Numerically smallest priority first, ties broken by earlier arrival.
///
/// Keyed by `(priority, arrival_ts, arrival_seq)`, so admit and remove are
/// O(log n) and the snapshot comes out ordered without re-sorting. This is
/// the only path whose cost grows with queue depth.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    tasks: BTreeMap<PriorityKey, Task>,
}

impl PriorityQueue {
    fn key(task: &Task) -> PriorityKey {
        (task.priority, task.arrival_ts, task.arrival_seq)
    }
}

impl SchedulingQueue for PriorityQueue {
    fn policy(&self) -> SchedulingPolicy {
        SchedulingPolicy::Priority
    }

    fn admit(&mut self, task: Task) {
        self.tasks.insert(Self::key(&task), task);
    }

    fn remove_next(&mut self) -> Option<Task> {
        self.tasks.pop_first().map(|(_, task)| task)
    }

    fn peek_next(&self) -> Option<&Task> {
        self.tasks.values().next()
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }

    fn snapshot(&self) -> Vec<&Task> {
        self.tasks.values().collect()
    }
}
