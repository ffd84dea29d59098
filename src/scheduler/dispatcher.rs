use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::scheduler::handle::DispatcherHandle;
use crate::scheduler::ledger::CompletionLedger;
use crate::scheduler::queue::{SchedulingPolicy, SchedulingQueue};
use crate::scheduler::status::StatusSnapshot;
use crate::scheduler::task::{Task, TaskSpec};
use crate::worker::executor::{ExecutionOutcome, Executor, WorkerCommand, WorkerReport};
use crate::worker::pool::WorkerPool;

const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Requests served by the dispatcher loop.
#[derive(Debug)]
pub enum DispatcherMessage {
    Submit {
        spec: TaskSpec,
        response_tx: oneshot::Sender<Result<Uuid>>,
    },
    BulkLoad {
        specs: Vec<TaskSpec>,
        response_tx: oneshot::Sender<Result<usize>>,
    },
    Status {
        response_tx: oneshot::Sender<StatusSnapshot>,
    },
    ChangePolicy {
        requested: String,
        response_tx: oneshot::Sender<Result<()>>,
    },
}

/// Sole owner of all scheduling state.
///
/// A task lives in exactly one place at a time: the queue while pending, the
/// `running` index while a worker holds it, and the ledger once complete.
/// Every mutation happens on whichever task drives [`Dispatcher::run`], so no
/// locking is needed.
pub struct Dispatcher {
    config: SchedulerConfig,
    queue: Box<dyn SchedulingQueue>,
    running: HashMap<Uuid, Task>,
    pool: WorkerPool,
    ledger: CompletionLedger,
    next_seq: u64,
}

impl Dispatcher {
    /// Build a dispatcher and spawn its worker pool. Workers report on `reports`.
    pub fn new(
        config: SchedulerConfig,
        executor: Arc<dyn Executor>,
        reports: mpsc::Sender<WorkerReport>,
    ) -> Self {
        let pool = WorkerPool::spawn(config.worker_count, executor, reports);
        Self {
            queue: config.policy.new_queue(),
            running: HashMap::new(),
            pool,
            ledger: CompletionLedger::new(config.completed_retention),
            next_seq: 0,
            config,
        }
    }

    pub fn policy(&self) -> SchedulingPolicy {
        self.config.policy
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn queue(&self) -> &dyn SchedulingQueue {
        self.queue.as_ref()
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn ledger(&self) -> &CompletionLedger {
        &self.ledger
    }

    /// Task currently held by a worker.
    pub fn running_task(&self, id: &Uuid) -> Option<&Task> {
        self.running.get(id)
    }

    pub fn running_len(&self) -> usize {
        self.running.len()
    }

    fn create_task(&mut self, spec: TaskSpec) -> Task {
        let task = Task::new(self.next_seq, spec);
        self.next_seq += 1;
        task
    }

    /// Admit one task, subject to the queue capacity.
    ///
    /// The capacity check and the admission happen in the same call on the
    /// dispatcher's task, so concurrent submissions cannot both pass a stale
    /// check.
    pub fn submit(&mut self, spec: TaskSpec) -> Result<Uuid> {
        spec.validate()?;
        if self.queue.len() >= self.config.max_queue {
            self.ledger.record_drop();
            tracing::warn!(
                capacity = self.config.max_queue,
                dropped = self.ledger.dropped_total(),
                "Queue full, submission dropped"
            );
            return Err(SchedulerError::QueueFull {
                capacity: self.config.max_queue,
            });
        }

        let task = self.create_task(spec);
        let task_id = task.id;
        tracing::info!(
            task_id = %task_id,
            task_type = %task.task_type,
            priority = task.priority,
            work_ms = task.work_ms,
            "Task submitted"
        );
        self.queue.admit(task);
        self.dispatch();
        Ok(task_id)
    }

    /// Admit a batch without checking capacity.
    ///
    /// Bulk loading is an operator tool for driving the system into overload,
    /// so it may push the queue past `max_queue`.
    pub fn bulk_load(&mut self, specs: Vec<TaskSpec>) -> Result<usize> {
        for spec in &specs {
            spec.validate()?;
        }
        let count = specs.len();
        for spec in specs {
            let task = self.create_task(spec);
            self.queue.admit(task);
        }
        if self.queue.len() > self.config.max_queue {
            tracing::warn!(
                queue_size = self.queue.len(),
                capacity = self.config.max_queue,
                "Bulk load pushed queue past capacity"
            );
        }
        tracing::info!(count, queue_size = self.queue.len(), "Bulk load queued");
        self.dispatch();
        Ok(count)
    }

    /// Pair idle workers with queued tasks until one side runs out.
    ///
    /// Safe to call at any time; with no idle worker or no queued task it
    /// does nothing. Returns the number of assignments made.
    pub fn dispatch(&mut self) -> usize {
        let mut assigned = 0;
        while let Some(worker_id) = self.pool.first_idle() {
            let Some(next) = self.queue.peek_next() else {
                break;
            };
            let command = WorkerCommand {
                task_id: next.id,
                work_ms: next.remaining_ms(),
                quantum_ms: self.config.quantum(),
            };

            match self.pool.assign(worker_id, command) {
                Ok(()) => {}
                Err(SchedulerError::WorkerUnavailable(_)) => {
                    // The actor is gone; replace it and try the same pairing again.
                    self.pool.respawn(worker_id);
                    continue;
                }
                Err(e) => {
                    tracing::error!(worker_id, error = %e, "Assignment failed");
                    break;
                }
            }

            let Some(mut task) = self.queue.remove_next() else {
                break;
            };
            task.mark_dispatched();
            tracing::debug!(
                task_id = %task.id,
                worker_id,
                remaining_ms = task.remaining_ms(),
                quantum_ms = ?command.quantum_ms,
                dispatch = task.dispatches(),
                "Task assigned"
            );
            self.running.insert(task.id, task);
            assigned += 1;
        }
        assigned
    }

    /// Apply a worker's report, free the worker and dispatch again.
    pub fn handle_report(&mut self, report: WorkerReport) {
        let WorkerReport {
            worker_id,
            task_id,
            outcome,
        } = report;

        match self.running.remove(&task_id) {
            None => {
                tracing::warn!(task_id = %task_id, worker_id, "Unknown task id returned");
            }
            Some(mut task) => match outcome {
                ExecutionOutcome::Consumed(consumed_ms) => {
                    if task.apply_progress(consumed_ms, Utc::now()) {
                        if let Some(entry) = self.ledger.record_completion(task) {
                            tracing::info!(
                                task_id = %entry.id,
                                worker_id,
                                latency_ms = entry.latency_ms(),
                                dispatches = entry.dispatches,
                                "Task completed"
                            );
                        }
                    } else {
                        tracing::debug!(
                            task_id = %task.id,
                            worker_id,
                            consumed_ms,
                            remaining_ms = task.remaining_ms(),
                            "Task preempted, requeued"
                        );
                        self.queue.admit(task);
                    }
                }
                ExecutionOutcome::Faulted(reason) => {
                    self.ledger.record_failure();
                    tracing::error!(
                        task_id = %task.id,
                        worker_id,
                        error = %reason,
                        remaining_ms = task.remaining_ms(),
                        "Worker fault, task marked failed"
                    );
                }
            },
        }

        self.pool.release(worker_id);
        self.dispatch();
    }

    /// Policy changes are validated but never applied at runtime.
    pub fn change_policy(&self, requested: &str) -> Result<()> {
        let policy: SchedulingPolicy = requested.parse()?;
        tracing::info!(
            current = %self.config.policy,
            requested = %policy,
            "Scheduler change requested, not supported dynamically"
        );
        Err(SchedulerError::PolicyChangeNotSupported(policy))
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            scheduler: self.config.policy,
            threads: self.pool.len(),
            quantum_ms: self.config.quantum(),
            queue_size: self.queue.len(),
            queue: self.queue.snapshot().into_iter().map(Into::into).collect(),
            workers: self.pool.views().into_iter().map(Into::into).collect(),
            running: self.running.len(),
            completed: self.ledger.completed_total(),
            dropped: self.ledger.dropped_total(),
            failed: self.ledger.failed_total(),
            recent_completed: self
                .ledger
                .recent(self.config.recent_completed_max)
                .map(Into::into)
                .collect(),
        }
    }

    fn handle_message(&mut self, msg: DispatcherMessage) {
        match msg {
            DispatcherMessage::Submit { spec, response_tx } => {
                let _ = response_tx.send(self.submit(spec));
            }
            DispatcherMessage::BulkLoad { specs, response_tx } => {
                let _ = response_tx.send(self.bulk_load(specs));
            }
            DispatcherMessage::Status { response_tx } => {
                let _ = response_tx.send(self.status());
            }
            DispatcherMessage::ChangePolicy {
                requested,
                response_tx,
            } => {
                let _ = response_tx.send(self.change_policy(&requested));
            }
        }
    }

    /// Control loop. Runs until shutdown or until every handle is dropped.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<DispatcherMessage>,
        mut reports: mpsc::Receiver<WorkerReport>,
        shutdown: CancellationToken,
    ) {
        tracing::info!(
            policy = %self.config.policy,
            workers = self.pool.len(),
            quantum_ms = ?self.config.quantum(),
            max_queue = self.config.max_queue,
            "Dispatcher started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(
                        queued = self.queue.len(),
                        running = self.running.len(),
                        "Dispatcher shutting down"
                    );
                    break;
                }

                Some(report) = reports.recv() => {
                    self.handle_report(report);
                }

                msg = commands.recv() => match msg {
                    Some(msg) => self.handle_message(msg),
                    None => break,
                },
            }
        }
    }
}

/// Validate `config`, start a dispatcher with its worker pool, and return a
/// handle to it.
pub fn spawn_dispatcher(
    config: SchedulerConfig,
    executor: Arc<dyn Executor>,
    shutdown: CancellationToken,
) -> Result<(DispatcherHandle, JoinHandle<()>)> {
    config.validate()?;
    let (report_tx, report_rx) = mpsc::channel(config.worker_count);
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

    let dispatcher = Dispatcher::new(config, executor, report_tx);
    let join = tokio::spawn(dispatcher.run(command_rx, report_rx, shutdown));
    Ok((DispatcherHandle::new(command_tx), join))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::executor::SleepExecutor;

    fn dispatcher(config: SchedulerConfig) -> (Dispatcher, mpsc::Receiver<WorkerReport>) {
        let (tx, rx) = mpsc::channel(16);
        (Dispatcher::new(config, Arc::new(SleepExecutor), tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn submit_assigns_immediately() {
        let (mut d, mut rx) = dispatcher(SchedulerConfig::default());
        let id = d.submit(TaskSpec::new("login", 1, 500)).unwrap();

        assert_eq!(d.queue().len(), 0);
        assert!(d.running_task(&id).unwrap().started());
        assert_eq!(d.pool().idle_count(), 3);

        let report = rx.recv().await.unwrap();
        assert_eq!(report.task_id, id);
        d.handle_report(report);

        assert_eq!(d.ledger().completed_total(), 1);
        assert!(d.running_task(&id).is_none());
        assert_eq!(d.pool().idle_count(), 4);
    }

    #[tokio::test]
    async fn dispatch_is_noop_without_work() {
        let (mut d, _rx) = dispatcher(SchedulerConfig::default());
        assert_eq!(d.dispatch(), 0);
        assert_eq!(d.dispatch(), 0);
        assert_eq!(d.pool().idle_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_is_noop_without_idle_workers() {
        let (mut d, _rx) = dispatcher(SchedulerConfig::default().with_workers(1));
        d.submit(TaskSpec::new("a", 1, 1000)).unwrap();
        d.submit(TaskSpec::new("b", 1, 1000)).unwrap();
        assert_eq!(d.dispatch(), 0);
        assert_eq!(d.queue().len(), 1);
        assert_eq!(d.running_len(), 1);
    }

    #[tokio::test]
    async fn full_queue_drops_submission() {
        let config = SchedulerConfig::default().with_workers(1).with_max_queue(2);
        let (mut d, _rx) = dispatcher(config);

        // One goes straight to the worker, two fill the queue.
        for _ in 0..3 {
            d.submit(TaskSpec::new("fetch", 5, 10_000)).unwrap();
        }
        assert_eq!(d.queue().len(), 2);

        let err = d.submit(TaskSpec::new("fetch", 5, 10_000)).unwrap_err();
        assert!(matches!(err, SchedulerError::QueueFull { capacity: 2 }));
        assert_eq!(d.ledger().dropped_total(), 1);
        assert_eq!(d.queue().len(), 2);
        assert_eq!(d.ledger().completed_total(), 0);
    }

    #[tokio::test]
    async fn invalid_spec_is_not_counted_as_drop() {
        let (mut d, _rx) = dispatcher(SchedulerConfig::default());
        assert!(d.submit(TaskSpec::new("fetch", 1, 0)).is_err());
        assert_eq!(d.ledger().dropped_total(), 0);
        assert_eq!(d.running_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_report_frees_worker() {
        let (mut d, mut rx) = dispatcher(SchedulerConfig::default().with_workers(1));
        d.submit(TaskSpec::new("login", 1, 50)).unwrap();
        let report = rx.recv().await.unwrap();
        let duplicate = report.clone();

        d.handle_report(report);
        assert_eq!(d.ledger().completed_total(), 1);

        d.handle_report(duplicate);
        assert_eq!(d.ledger().completed_total(), 1);
        assert_eq!(d.pool().idle_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_report_requeues_under_any_policy() {
        let (mut d, mut rx) = dispatcher(SchedulerConfig::default().with_workers(1));
        let id = d.submit(TaskSpec::new("fetch", 1, 500)).unwrap();
        let _ = rx.recv().await.unwrap();

        d.handle_report(WorkerReport {
            worker_id: 0,
            task_id: id,
            outcome: ExecutionOutcome::Consumed(200),
        });

        // Requeued, then immediately dispatched again to the freed worker.
        let task = d.running_task(&id).unwrap();
        assert_eq!(task.remaining_ms(), 300);
        assert_eq!(task.dispatches(), 2);
        assert_eq!(d.ledger().completed_total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn preempted_priority_task_keeps_its_place() {
        let config = SchedulerConfig::default()
            .with_policy(SchedulingPolicy::Priority)
            .with_workers(1);
        let (mut d, mut rx) = dispatcher(config);
        let urgent = d.submit(TaskSpec::new("login", 1, 500)).unwrap();
        let middle = d.submit(TaskSpec::new("fetch", 3, 500)).unwrap();
        let relaxed = d.submit(TaskSpec::new("submit", 8, 500)).unwrap();
        let _ = rx.recv().await.unwrap();

        d.handle_report(WorkerReport {
            worker_id: 0,
            task_id: urgent,
            outcome: ExecutionOutcome::Consumed(200),
        });

        // Back ahead of the less urgent tasks, so it is picked again at once.
        let task = d.running_task(&urgent).unwrap();
        assert_eq!(task.remaining_ms(), 300);
        assert_eq!(task.dispatches(), 2);
        let queued: Vec<Uuid> = d.queue().snapshot().iter().map(|t| t.id).collect();
        assert_eq!(queued, vec![middle, relaxed]);
        assert_eq!(d.pool().current_task(0), Some(urgent));
    }

    #[tokio::test(start_paused = true)]
    async fn fault_marks_task_failed() {
        let (mut d, mut rx) = dispatcher(SchedulerConfig::default().with_workers(1));
        let id = d.submit(TaskSpec::new("submit", 1, 100)).unwrap();
        let _ = rx.recv().await.unwrap();

        d.handle_report(WorkerReport {
            worker_id: 0,
            task_id: id,
            outcome: ExecutionOutcome::Faulted("boom".to_string()),
        });

        assert_eq!(d.ledger().failed_total(), 1);
        assert_eq!(d.ledger().completed_total(), 0);
        assert!(d.running_task(&id).is_none());
        assert!(d.queue().is_empty());
        assert_eq!(d.pool().idle_count(), 1);
    }

    #[tokio::test]
    async fn policy_change_is_rejected() {
        let (d, _rx) = dispatcher(SchedulerConfig::default());
        assert!(matches!(
            d.change_policy("ROUND_ROBIN"),
            Err(SchedulerError::PolicyChangeNotSupported(SchedulingPolicy::RoundRobin))
        ));
        assert!(matches!(
            d.change_policy("LOTTERY"),
            Err(SchedulerError::InvalidPolicy(_))
        ));
        assert_eq!(d.status().scheduler, SchedulingPolicy::Priority);
    }

    #[tokio::test]
    async fn spawn_rejects_invalid_config() {
        let result = spawn_dispatcher(
            SchedulerConfig::default().with_workers(0),
            Arc::new(SleepExecutor),
            CancellationToken::new(),
        );
        assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
    }
}
