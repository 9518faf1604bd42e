//! Background schedulers with explicit start/stop lifecycles
//!
//! Each scheduler owns a cancellation token and the join handle of its task;
//! `stop` cancels and awaits the task under a timeout.

pub mod error;
pub mod resync_scheduler;
pub mod usage_sampler;

pub use error::{SchedulerError, SchedulerResult};
pub use resync_scheduler::{ResyncScheduler, ResyncSchedulerConfig};
pub use usage_sampler::{UsageSampler, UsageSamplerConfig};
