//! Worker pool for simulated task execution.
//!
//! - [`Executor`]: burns the simulated work for one command
//! - [`WorkerPool`]: fixed set of worker actors plus their busy flags
//!
//! A worker accepts one [`WorkerCommand`] at a time and answers with exactly
//! one [`WorkerReport`]. The consumed time in the report is what the
//! dispatcher trusts, not the amount it asked for.

pub mod executor;
pub mod pool;

pub use executor::{
    ExecutionOutcome, Executor, SleepExecutor, WorkerCommand, WorkerFault, WorkerReport,
};
pub use pool::{WorkerPool, WorkerView};
