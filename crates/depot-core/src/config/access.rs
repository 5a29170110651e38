//! Access delegation configuration.

use serde::{Deserialize, Serialize};

/// Project access service configuration.
///
/// Project-bucket authorization is delegated to this remote service. The
/// timeout is a hard bound; exceeding it counts as the service being
/// unavailable, never as an allow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Base URL of the project access service.
    #[serde(default = "default_project_service_url")]
    pub project_service_url: String,
    /// Request timeout in milliseconds for delegated checks.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            project_service_url: default_project_service_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_project_service_url() -> String {
    "http://localhost:7300".to_string()
}

fn default_timeout_ms() -> u64 {
    2000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout_is_two_seconds() {
        assert_eq!(AccessConfig::default().timeout_ms, 2000);
    }
}
