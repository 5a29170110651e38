//! HTTP client for the external project access service.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use depot_core::config::access::AccessConfig;
use depot_core::error::AppError;
use depot_core::result::AppResult;

use crate::decision::{AccessAction, AccessDecision};

/// A single delegated access check.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectAccessCheck {
    /// The project whose membership rules apply.
    pub project_id: Uuid,
    /// The user requesting access.
    pub user_id: Uuid,
    /// The requested action.
    pub action: AccessAction,
    /// The file in question, when the check is file-specific.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    allowed: bool,
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    checks: &'a [ProjectAccessCheck],
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    results: Vec<CheckResponse>,
}

/// Client for the project access service.
///
/// Every failure mode of the remote call (timeout, transport error,
/// non-success status, malformed body) collapses into
/// `AccessDecision::Unavailable`. The client never invents an allow or a
/// deny on the service's behalf.
#[derive(Debug, Clone)]
pub struct ProjectAccessClient {
    client: reqwest::Client,
    base_url: String,
}

impl ProjectAccessClient {
    /// Build a client from configuration.
    ///
    /// The configured timeout bounds the whole request, connect included.
    pub fn new(config: &AccessConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                AppError::with_source(
                    depot_core::error::ErrorKind::Configuration,
                    "Failed to build project access HTTP client",
                    e,
                )
            })?;

        Ok(Self {
            client,
            base_url: config.project_service_url.trim_end_matches('/').to_string(),
        })
    }

    /// Ask the service whether one action is allowed.
    pub async fn check(&self, check: &ProjectAccessCheck) -> AccessDecision {
        let url = format!("{}/check-file-access", self.base_url);
        let response = match self.client.post(&url).json(check).send().await {
            Ok(r) => r,
            Err(e) => return Self::unavailable("request", &e),
        };

        if !response.status().is_success() {
            warn!(
                status = %response.status(),
                project_id = %check.project_id,
                "Project access service returned an error status"
            );
            return AccessDecision::Unavailable {
                reason: format!("Project access service returned {}", response.status()),
            };
        }

        match response.json::<CheckResponse>().await {
            Ok(body) => Self::decision_from(body),
            Err(e) => Self::unavailable("response body", &e),
        }
    }

    /// Ask the service about several actions in one round trip.
    ///
    /// Results come back in the same order as the input checks. A failed
    /// call makes every check unavailable; the service answering for some
    /// checks but not others is not a supported outcome.
    pub async fn check_batch(&self, checks: &[ProjectAccessCheck]) -> Vec<AccessDecision> {
        if checks.is_empty() {
            return Vec::new();
        }

        let url = format!("{}/check-file-access/batch", self.base_url);
        let response = match self
            .client
            .post(&url)
            .json(&BatchRequest { checks })
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return vec![Self::unavailable("request", &e); checks.len()],
        };

        if !response.status().is_success() {
            let reason = format!("Project access service returned {}", response.status());
            return vec![AccessDecision::Unavailable { reason }; checks.len()];
        }

        match response.json::<BatchResponse>().await {
            Ok(body) if body.results.len() == checks.len() => {
                body.results.into_iter().map(Self::decision_from).collect()
            }
            Ok(body) => {
                warn!(
                    expected = checks.len(),
                    got = body.results.len(),
                    "Project access batch response length mismatch"
                );
                let reason = "Project access service returned a mismatched batch".to_string();
                vec![AccessDecision::Unavailable { reason }; checks.len()]
            }
            Err(e) => vec![Self::unavailable("response body", &e); checks.len()],
        }
    }

    fn decision_from(body: CheckResponse) -> AccessDecision {
        if body.allowed {
            AccessDecision::Allowed
        } else {
            AccessDecision::Denied {
                reason: body
                    .reason
                    .unwrap_or_else(|| "Denied by project access service".to_string()),
            }
        }
    }

    fn unavailable(stage: &str, err: &reqwest::Error) -> AccessDecision {
        warn!(stage, error = %err, "Project access service unreachable");
        AccessDecision::Unavailable {
            reason: if err.is_timeout() {
                "Project access service timed out".to_string()
            } else {
                format!("Project access service {stage} failed")
            },
        }
    }
}
