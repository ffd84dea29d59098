use thiserror::Error;

use crate::scheduler::SchedulingPolicy;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Queue is at capacity ({capacity} tasks)")]
    QueueFull { capacity: usize },

    #[error("Invalid scheduler policy: {0}")]
    InvalidPolicy(String),

    #[error("Changing scheduler to {0} is not supported dynamically")]
    PolicyChangeNotSupported(SchedulingPolicy),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Worker w-{0} is busy")]
    WorkerBusy(usize),

    #[error("Worker w-{0} is unavailable")]
    WorkerUnavailable(usize),

    #[error("Dispatcher is not running")]
    Unavailable,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
