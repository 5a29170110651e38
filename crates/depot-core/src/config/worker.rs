//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Scheduled maintenance worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the worker is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cron expression for the reconciliation scan (6-field, with seconds).
    #[serde(default = "default_reconcile_schedule")]
    pub reconcile_schedule: String,
    /// Whether scheduled scans run in fix mode (report-only by default).
    #[serde(default)]
    pub reconcile_fix: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reconcile_schedule: default_reconcile_schedule(),
            reconcile_fix: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_reconcile_schedule() -> String {
    // Daily at 02:30, out of band with request traffic.
    "0 30 2 * * *".to_string()
}
