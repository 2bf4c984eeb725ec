//! Scheduled background jobs.

mod maintenance;

pub use maintenance::{next_run_delay, MaintenanceScheduler, MaintenanceSchedulerConfig};
