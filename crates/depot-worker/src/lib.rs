//! Scheduled maintenance tasks for Depot.
//!
//! The worker runs the periodic reconciliation scan on a cron schedule so
//! drift between the object store and metadata is caught without operator
//! intervention.

pub mod scheduler;

pub use scheduler::CronScheduler;
