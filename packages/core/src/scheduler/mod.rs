//! Task registry and the fixed-cadence tick that drives it.

pub mod poller;
pub mod task;

pub use poller::{PollingScheduler, SchedulerConfig, SchedulerError};
pub use task::{FanOutResult, PollingTask, ProviderFailure, TaskKind, TaskStatus, TaskType};
