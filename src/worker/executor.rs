use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// An execution failure reported by a worker instead of consumed time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFault(pub String);

impl std::fmt::Display for WorkerFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Burns simulated work for one task.
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    /// Run for `amount` and return how long actually elapsed.
    async fn execute(&self, task_id: Uuid, amount: Duration) -> Result<Duration, WorkerFault>;
}

/// Models CPU burn with a timer. No computation happens.
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepExecutor;

#[async_trait]
impl Executor for SleepExecutor {
    async fn execute(&self, _task_id: Uuid, amount: Duration) -> Result<Duration, WorkerFault> {
        let start = tokio::time::Instant::now();
        tokio::time::sleep(amount).await;
        Ok(start.elapsed())
    }
}

/// One execution request for a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerCommand {
    pub task_id: Uuid,
    pub work_ms: u64,
    pub quantum_ms: Option<u64>,
}

impl WorkerCommand {
    /// How much of the task this command runs: the whole remainder, or at
    /// most one quantum.
    pub fn exec_amount(&self) -> u64 {
        match self.quantum_ms {
            Some(quantum) => self.work_ms.min(quantum),
            None => self.work_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Milliseconds actually elapsed. Authoritative over the requested amount.
    Consumed(u64),
    Faulted(String),
}

/// Sent back to the dispatcher after every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub task_id: Uuid,
    pub outcome: ExecutionOutcome,
}

/// Aborts the wrapped execution when dropped, so cancelling the worker
/// actor also cancels whatever it was running.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Worker actor: takes one command at a time and always answers with a report.
///
/// Each execution runs in its own spawned task so that a panicking executor
/// surfaces as a fault rather than taking the worker down with it. Exits when
/// the command channel closes or the dispatcher stops listening.
pub async fn run_worker(
    worker_id: usize,
    executor: Arc<dyn Executor>,
    mut commands: mpsc::Receiver<WorkerCommand>,
    reports: mpsc::Sender<WorkerReport>,
) {
    while let Some(command) = commands.recv().await {
        let amount = Duration::from_millis(command.exec_amount());
        tracing::debug!(
            worker_id,
            task_id = %command.task_id,
            exec_ms = command.exec_amount(),
            "Worker executing"
        );

        let exec = executor.clone();
        let task_id = command.task_id;
        let mut execution =
            AbortOnDrop(tokio::spawn(async move { exec.execute(task_id, amount).await }));
        let outcome = match (&mut execution.0).await {
            Ok(Ok(elapsed)) => ExecutionOutcome::Consumed(elapsed.as_millis() as u64),
            Ok(Err(fault)) => ExecutionOutcome::Faulted(fault.to_string()),
            Err(e) => ExecutionOutcome::Faulted(format!("execution aborted: {}", e)),
        };

        let report = WorkerReport {
            worker_id,
            task_id,
            outcome,
        };
        if reports.send(report).await.is_err() {
            break;
        }
    }
    tracing::debug!(worker_id, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn exec_amount_respects_quantum() {
        let id = Uuid::new_v4();
        let full = WorkerCommand {
            task_id: id,
            work_ms: 500,
            quantum_ms: None,
        };
        assert_eq!(full.exec_amount(), 500);

        let sliced = WorkerCommand {
            quantum_ms: Some(200),
            ..full
        };
        assert_eq!(sliced.exec_amount(), 200);

        let short = WorkerCommand {
            work_ms: 50,
            quantum_ms: Some(200),
            ..full
        };
        assert_eq!(short.exec_amount(), 50);
    }

    /// Records whether an execution ran to the end.
    struct TrackingExecutor {
        finished: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Executor for TrackingExecutor {
        async fn execute(&self, _task_id: Uuid, amount: Duration) -> Result<Duration, WorkerFault> {
            tokio::time::sleep(amount).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(amount)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn aborting_worker_cancels_running_execution() {
        let finished = Arc::new(AtomicBool::new(false));
        let executor = Arc::new(TrackingExecutor {
            finished: finished.clone(),
        });
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let (report_tx, mut report_rx) = mpsc::channel(1);
        let worker = tokio::spawn(run_worker(0, executor, cmd_rx, report_tx));

        cmd_tx
            .send(WorkerCommand {
                task_id: Uuid::new_v4(),
                work_ms: 100,
                quantum_ms: None,
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        worker.abort();
        assert!(worker.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!finished.load(Ordering::SeqCst));
        assert!(report_rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_executor_reports_elapsed_time() {
        let elapsed = SleepExecutor
            .execute(Uuid::new_v4(), Duration::from_millis(250))
            .await
            .unwrap();
        assert_eq!(elapsed, Duration::from_millis(250));
    }
}
