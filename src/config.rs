use std::net::SocketAddr;

use crate::error::{Result, SchedulerError};
use crate::scheduler::SchedulingPolicy;

/// Tunables for the dispatcher and its worker pool.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Ordering policy for queued tasks. Fixed for the process lifetime.
    pub policy: SchedulingPolicy,
    /// Number of workers in the pool. Fixed for the process lifetime.
    pub worker_count: usize,
    /// Maximum execution slice handed to a worker under round-robin.
    pub rr_quantum_ms: u64,
    /// Single submissions are rejected once this many tasks are queued.
    pub max_queue: usize,
    /// How many completed tasks the ledger keeps before evicting the oldest.
    pub completed_retention: usize,
    /// How many recent completions the status snapshot reports.
    pub recent_completed_max: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: SchedulingPolicy::Priority,
            worker_count: 4,
            rr_quantum_ms: 200,
            max_queue: 1000,
            completed_retention: 10_000,
            recent_completed_max: 1000,
        }
    }
}

impl SchedulerConfig {
    pub fn with_policy(mut self, policy: SchedulingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_quantum_ms(mut self, rr_quantum_ms: u64) -> Self {
        self.rr_quantum_ms = rr_quantum_ms;
        self
    }

    pub fn with_max_queue(mut self, max_queue: usize) -> Self {
        self.max_queue = max_queue;
        self
    }

    pub fn with_retention(mut self, completed_retention: usize) -> Self {
        self.completed_retention = completed_retention;
        self
    }

    /// The quantum handed to workers, only set under round-robin.
    pub fn quantum(&self) -> Option<u64> {
        match self.policy {
            SchedulingPolicy::RoundRobin => Some(self.rr_quantum_ms),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(SchedulerError::InvalidConfig(
                "worker pool needs at least one worker".to_string(),
            ));
        }
        if self.policy == SchedulingPolicy::RoundRobin && self.rr_quantum_ms == 0 {
            return Err(SchedulerError::InvalidConfig(
                "round-robin quantum must be positive".to_string(),
            ));
        }
        if self.max_queue == 0 {
            return Err(SchedulerError::InvalidConfig(
                "queue capacity must be positive".to_string(),
            ));
        }
        if self.completed_retention == 0 {
            return Err(SchedulerError::InvalidConfig(
                "ledger retention must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub scheduler: SchedulerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            // SAFETY: This is a hardcoded valid address that will always parse
            listen_addr: "0.0.0.0:3001"
                .parse()
                .expect("default listen address is valid"),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(listen_addr: SocketAddr, scheduler: SchedulerConfig) -> Self {
        Self {
            listen_addr,
            scheduler,
        }
    }
}
