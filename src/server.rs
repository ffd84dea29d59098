use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::scheduler::spawn_dispatcher;
use crate::worker::{Executor, SleepExecutor};

/// Wires the dispatcher, its worker pool and the HTTP API together.
pub struct Server {
    pub config: ServerConfig,
    executor: Arc<dyn Executor>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_executor(config, Arc::new(SleepExecutor))
    }

    pub fn with_executor(config: ServerConfig, executor: Arc<dyn Executor>) -> Self {
        Self { config, executor }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// 1. Spawns the dispatcher loop and its worker pool
    /// 2. Serves the HTTP API until shutdown
    /// 3. Waits for the dispatcher to stop
    ///
    /// In-flight simulated work is abandoned on shutdown; nothing is persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the listener
    /// cannot be bound.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let scheduler = &self.config.scheduler;
        tracing::info!(
            policy = %scheduler.policy,
            workers = scheduler.worker_count,
            rr_quantum_ms = scheduler.rr_quantum_ms,
            max_queue = scheduler.max_queue,
            "Load manager starting"
        );

        let (handle, dispatcher) =
            spawn_dispatcher(scheduler.clone(), self.executor.clone(), shutdown.clone())?;

        let served = api::serve(self.config.listen_addr, handle, shutdown.clone()).await;
        // Stop the dispatcher whether the server exited cleanly or not.
        shutdown.cancel();
        if let Err(e) = dispatcher.await {
            tracing::error!(error = %e, "Dispatcher task failed");
        }
        served
    }
}
