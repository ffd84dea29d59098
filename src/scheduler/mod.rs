//! Scheduling core: tasks, policy queues, the dispatcher loop and the
//! completion ledger.
//!
//! # Flow
//!
//! 1. A [`TaskSpec`] is submitted through a [`DispatcherHandle`]
//! 2. The [`Dispatcher`] wraps it in a [`Task`] and admits it to the policy queue
//! 3. Idle workers are paired with the next task the policy picks
//! 4. Worker reports either finish the task into the [`CompletionLedger`] or
//!    put it back in the queue with less work remaining
//!
//! All of this state belongs to a single dispatcher; workers only ever see
//! commands and send reports.

pub mod dispatcher;
pub mod handle;
pub mod ledger;
pub mod load;
pub mod queue;
pub mod status;
pub mod task;

pub use dispatcher::{spawn_dispatcher, Dispatcher, DispatcherMessage};
pub use handle::DispatcherHandle;
pub use ledger::{CompletedTask, CompletionLedger};
pub use load::{LoadRequest, MAX_LOAD_COUNT};
pub use queue::{SchedulingPolicy, SchedulingQueue};
pub use status::StatusSnapshot;
pub use task::{Task, TaskSpec};
