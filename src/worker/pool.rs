use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::worker::executor::{run_worker, Executor, WorkerCommand, WorkerReport};

/// Read-only view of one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerView {
    pub id: usize,
    pub busy: bool,
    pub task_id: Option<Uuid>,
    pub since: DateTime<Utc>,
}

impl WorkerView {
    pub fn name(&self) -> String {
        worker_name(self.id)
    }
}

pub fn worker_name(id: usize) -> String {
    format!("w-{}", id)
}

#[derive(Debug)]
struct WorkerSlot {
    id: usize,
    busy: bool,
    task_id: Option<Uuid>,
    since: DateTime<Utc>,
    commands: mpsc::Sender<WorkerCommand>,
    handle: JoinHandle<()>,
}

/// Fixed set of worker actors and their busy flags.
///
/// Only the dispatcher touches the flags; workers never see them.
pub struct WorkerPool {
    slots: Vec<WorkerSlot>,
    executor: Arc<dyn Executor>,
    reports: mpsc::Sender<WorkerReport>,
}

impl WorkerPool {
    /// Spawn `size` idle workers that report on `reports`.
    pub fn spawn(
        size: usize,
        executor: Arc<dyn Executor>,
        reports: mpsc::Sender<WorkerReport>,
    ) -> Self {
        let mut pool = Self {
            slots: Vec::with_capacity(size),
            executor,
            reports,
        };
        for id in 0..size {
            let slot = pool.start_worker(id);
            pool.slots.push(slot);
        }
        tracing::info!(workers = size, "Worker pool started");
        pool
    }

    fn start_worker(&self, id: usize) -> WorkerSlot {
        // Capacity 1: a worker never holds more than one command.
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(run_worker(
            id,
            self.executor.clone(),
            rx,
            self.reports.clone(),
        ));
        WorkerSlot {
            id,
            busy: false,
            task_id: None,
            since: Utc::now(),
            commands: tx,
            handle,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn idle_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.busy).count()
    }

    /// First idle worker by id. Not necessarily the one idle longest.
    pub fn first_idle(&self) -> Option<usize> {
        self.slots.iter().find(|s| !s.busy).map(|s| s.id)
    }

    pub fn is_busy(&self, worker_id: usize) -> bool {
        self.slots.get(worker_id).is_some_and(|s| s.busy)
    }

    pub fn current_task(&self, worker_id: usize) -> Option<Uuid> {
        self.slots.get(worker_id).and_then(|s| s.task_id)
    }

    /// Hand a command to an idle worker and mark it busy.
    pub fn assign(&mut self, worker_id: usize, command: WorkerCommand) -> Result<()> {
        let slot = self
            .slots
            .get_mut(worker_id)
            .ok_or(SchedulerError::WorkerUnavailable(worker_id))?;
        if slot.busy {
            return Err(SchedulerError::WorkerBusy(worker_id));
        }
        match slot.commands.try_send(command) {
            Ok(()) => {
                slot.busy = true;
                slot.task_id = Some(command.task_id);
                slot.since = Utc::now();
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(SchedulerError::WorkerBusy(worker_id)),
            Err(TrySendError::Closed(_)) => Err(SchedulerError::WorkerUnavailable(worker_id)),
        }
    }

    /// Mark a worker idle. Returns the task it was holding, if any.
    pub fn release(&mut self, worker_id: usize) -> Option<Uuid> {
        let slot = self.slots.get_mut(worker_id)?;
        slot.busy = false;
        slot.since = Utc::now();
        slot.task_id.take()
    }

    /// Replace a worker whose actor has gone away. The new worker starts idle.
    pub fn respawn(&mut self, worker_id: usize) {
        if worker_id >= self.slots.len() {
            return;
        }
        let slot = self.start_worker(worker_id);
        let old = std::mem::replace(&mut self.slots[worker_id], slot);
        old.handle.abort();
        tracing::warn!(worker_id, "Worker respawned");
    }

    pub fn views(&self) -> Vec<WorkerView> {
        self.slots
            .iter()
            .map(|s| WorkerView {
                id: s.id,
                busy: s.busy,
                task_id: s.task_id,
                since: s.since,
            })
            .collect()
    }

    #[cfg(test)]
    fn kill(&mut self, worker_id: usize) {
        let (tx, _) = mpsc::channel(1);
        self.slots[worker_id].commands = tx;
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for slot in &self.slots {
            slot.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::executor::{ExecutionOutcome, SleepExecutor};

    fn command(work_ms: u64) -> WorkerCommand {
        WorkerCommand {
            task_id: Uuid::new_v4(),
            work_ms,
            quantum_ms: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn assign_marks_busy_and_release_frees() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut pool = WorkerPool::spawn(2, Arc::new(SleepExecutor), tx);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.idle_count(), 2);
        assert_eq!(pool.first_idle(), Some(0));

        let cmd = command(100);
        pool.assign(0, cmd).unwrap();
        assert!(pool.is_busy(0));
        assert_eq!(pool.current_task(0), Some(cmd.task_id));
        assert_eq!(pool.first_idle(), Some(1));

        let report = rx.recv().await.unwrap();
        assert_eq!(report.worker_id, 0);
        assert_eq!(report.task_id, cmd.task_id);
        assert_eq!(report.outcome, ExecutionOutcome::Consumed(100));

        assert_eq!(pool.release(0), Some(cmd.task_id));
        assert!(!pool.is_busy(0));
        assert_eq!(pool.idle_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_worker_rejects_second_command() {
        let (tx, _rx) = mpsc::channel(8);
        let mut pool = WorkerPool::spawn(1, Arc::new(SleepExecutor), tx);
        pool.assign(0, command(1000)).unwrap();
        assert!(matches!(
            pool.assign(0, command(10)),
            Err(SchedulerError::WorkerBusy(0))
        ));
        assert!(pool.first_idle().is_none());
    }

    #[tokio::test]
    async fn unknown_worker_is_unavailable() {
        let (tx, _rx) = mpsc::channel(8);
        let mut pool = WorkerPool::spawn(1, Arc::new(SleepExecutor), tx);
        assert!(matches!(
            pool.assign(3, command(10)),
            Err(SchedulerError::WorkerUnavailable(3))
        ));
        assert_eq!(pool.release(3), None);
    }

    #[tokio::test(start_paused = true)]
    async fn respawn_restores_capacity() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut pool = WorkerPool::spawn(1, Arc::new(SleepExecutor), tx);
        pool.kill(0);
        assert!(matches!(
            pool.assign(0, command(10)),
            Err(SchedulerError::WorkerUnavailable(0))
        ));
        assert!(!pool.is_busy(0));

        pool.respawn(0);
        assert_eq!(pool.len(), 1);
        pool.assign(0, command(10)).unwrap();
        let report = rx.recv().await.unwrap();
        assert_eq!(report.outcome, ExecutionOutcome::Consumed(10));
    }
}
