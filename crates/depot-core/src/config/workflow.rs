//! Version workflow configuration.

use serde::{Deserialize, Serialize};

/// Tunables for the lock/version/validation workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Whether a force-unlock archives the draft that was riding on the
    /// lock. The default keeps the draft; its later commit fails with
    /// LockExpired.
    #[serde(default)]
    pub discard_draft_on_force_unlock: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            discard_draft_on_force_unlock: false,
        }
    }
}
