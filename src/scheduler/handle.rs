use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::scheduler::dispatcher::DispatcherMessage;
use crate::scheduler::load::LoadRequest;
use crate::scheduler::status::StatusSnapshot;
use crate::scheduler::task::TaskSpec;

/// Cloneable front door to a running dispatcher.
///
/// Each call is one message to the dispatcher loop and one reply, so callers
/// never touch scheduling state directly.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<DispatcherMessage>,
}

impl DispatcherHandle {
    pub fn new(tx: mpsc::Sender<DispatcherMessage>) -> Self {
        Self { tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> DispatcherMessage,
    ) -> Result<T> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(build(response_tx))
            .await
            .map_err(|_| SchedulerError::Unavailable)?;
        response_rx.await.map_err(|_| SchedulerError::Unavailable)
    }

    /// Submit one task. Fails with `QueueFull` when the queue is at capacity.
    pub async fn submit(&self, spec: TaskSpec) -> Result<Uuid> {
        self.request(|response_tx| DispatcherMessage::Submit { spec, response_tx })
            .await?
    }

    /// Generate and queue a batch of random tasks. Returns how many were queued.
    pub async fn bulk_load(&self, request: LoadRequest) -> Result<usize> {
        request.validate()?;
        let specs = request.generate(&mut rand::thread_rng());
        self.request(|response_tx| DispatcherMessage::BulkLoad { specs, response_tx })
            .await?
    }

    pub async fn status(&self) -> Result<StatusSnapshot> {
        self.request(|response_tx| DispatcherMessage::Status { response_tx })
            .await
    }

    pub async fn change_policy(&self, requested: impl Into<String>) -> Result<()> {
        let requested = requested.into();
        self.request(|response_tx| DispatcherMessage::ChangePolicy {
            requested,
            response_tx,
        })
        .await?
    }

    /// True while the dispatcher loop is still receiving.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}
