pub mod scheduler;

pub use scheduler::{SchedulerOptions, SyncScheduler};
