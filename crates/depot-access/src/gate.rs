//! The access gate: one entry point for all authorization checks.

use std::sync::Arc;

use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use depot_core::result::AppResult;
use depot_core::types::context::RequestContext;
use depot_database::repositories::AuditStore;
use depot_entity::audit::model::CreateAuditLogEntry;
use depot_entity::file::status::BucketType;

use crate::decision::{AccessAction, AccessDecision};
use crate::project::{ProjectAccessCheck, ProjectAccessClient};

/// A single access check request.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    /// Scope being accessed.
    pub bucket_type: BucketType,
    /// Owner of the scope.
    pub bucket_id: Uuid,
    /// Requested action.
    pub action: AccessAction,
    /// The file in question, when file-specific.
    pub file_id: Option<Uuid>,
}

/// Authorization gate for all Depot operations.
///
/// Personal and organizational buckets are decided locally from the
/// request context. Project buckets are delegated to the project access
/// service. Refusals are audited best-effort; an audit failure never turns
/// an answered check into an error.
#[derive(Debug, Clone)]
pub struct AccessGate {
    project_client: ProjectAccessClient,
    audit_repo: Arc<dyn AuditStore>,
}

impl AccessGate {
    /// Create a new access gate.
    pub fn new(project_client: ProjectAccessClient, audit_repo: Arc<dyn AuditStore>) -> Self {
        Self {
            project_client,
            audit_repo,
        }
    }

    /// Decide whether the context may perform the action.
    pub async fn check(&self, ctx: &RequestContext, request: &AccessRequest) -> AccessDecision {
        let decision = match request.bucket_type {
            BucketType::Personal | BucketType::Organizational => local_decision(ctx, request),
            BucketType::Project => {
                self.project_client
                    .check(&ProjectAccessCheck {
                        project_id: request.bucket_id,
                        user_id: ctx.user_id,
                        action: request.action,
                        file_id: request.file_id,
                    })
                    .await
            }
        };

        if !decision.is_allowed() {
            self.audit_refusal(ctx, request, &decision).await;
        }
        decision
    }

    /// Decide several checks at once, preserving input order.
    ///
    /// Local checks are answered inline; project checks are collected into
    /// a single batched call to the access service.
    pub async fn check_batch(
        &self,
        ctx: &RequestContext,
        requests: &[AccessRequest],
    ) -> Vec<AccessDecision> {
        let mut decisions: Vec<Option<AccessDecision>> = Vec::with_capacity(requests.len());
        let mut project_checks = Vec::new();
        let mut project_slots = Vec::new();

        for (idx, request) in requests.iter().enumerate() {
            match request.bucket_type {
                BucketType::Personal | BucketType::Organizational => {
                    decisions.push(Some(local_decision(ctx, request)));
                }
                BucketType::Project => {
                    decisions.push(None);
                    project_slots.push(idx);
                    project_checks.push(ProjectAccessCheck {
                        project_id: request.bucket_id,
                        user_id: ctx.user_id,
                        action: request.action,
                        file_id: request.file_id,
                    });
                }
            }
        }

        if !project_checks.is_empty() {
            let results = self.project_client.check_batch(&project_checks).await;
            for (slot, decision) in project_slots.into_iter().zip(results) {
                decisions[slot] = Some(decision);
            }
        }

        let decisions: Vec<AccessDecision> = decisions
            .into_iter()
            .map(|d| d.unwrap_or(AccessDecision::Unavailable {
                reason: "Access check produced no answer".to_string(),
            }))
            .collect();

        for (request, decision) in requests.iter().zip(&decisions) {
            if !decision.is_allowed() {
                self.audit_refusal(ctx, request, decision).await;
            }
        }
        decisions
    }

    /// Check and convert the outcome into a result in one step.
    pub async fn authorize(&self, ctx: &RequestContext, request: &AccessRequest) -> AppResult<()> {
        self.check(ctx, request).await.into_result()
    }

    async fn audit_refusal(
        &self,
        ctx: &RequestContext,
        request: &AccessRequest,
        decision: &AccessDecision,
    ) {
        let (outcome, reason) = match decision {
            AccessDecision::Allowed => return,
            AccessDecision::Denied { reason } => ("denied", reason),
            AccessDecision::Unavailable { reason } => ("unavailable", reason),
        };

        let entry = CreateAuditLogEntry {
            entity_type: "bucket".to_string(),
            entity_id: request.bucket_id,
            action: format!("access.{outcome}"),
            actor_id: ctx.user_id,
            details: Some(json!({
                "bucket_type": request.bucket_type.as_str(),
                "requested_action": request.action.as_str(),
                "file_id": request.file_id,
                "reason": reason,
            })),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        };

        if let Err(e) = self.audit_repo.create(&entry).await {
            warn!(error = %e, "Failed to audit access refusal");
        }
    }
}

/// Local rules for personal and organizational buckets.
fn local_decision(ctx: &RequestContext, request: &AccessRequest) -> AccessDecision {
    match request.bucket_type {
        BucketType::Personal => {
            if request.bucket_id == ctx.user_id {
                AccessDecision::Allowed
            } else {
                AccessDecision::Denied {
                    reason: "Personal buckets are accessible only to their owner".to_string(),
                }
            }
        }
        BucketType::Organizational => {
            if request.bucket_id == ctx.org_id {
                AccessDecision::Allowed
            } else {
                AccessDecision::Denied {
                    reason: "File belongs to a different organization".to_string(),
                }
            }
        }
        BucketType::Project => AccessDecision::Unavailable {
            reason: "Project buckets cannot be decided locally".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RequestContext {
        RequestContext::new(Uuid::new_v4(), Uuid::new_v4(), None, None)
    }

    fn request(bucket_type: BucketType, bucket_id: Uuid) -> AccessRequest {
        AccessRequest {
            bucket_type,
            bucket_id,
            action: AccessAction::Read,
            file_id: None,
        }
    }

    #[test]
    fn test_personal_bucket_owner_only() {
        let ctx = ctx();
        let own = request(BucketType::Personal, ctx.user_id);
        assert!(local_decision(&ctx, &own).is_allowed());

        let other = request(BucketType::Personal, Uuid::new_v4());
        assert!(matches!(
            local_decision(&ctx, &other),
            AccessDecision::Denied { .. }
        ));
    }

    #[test]
    fn test_organizational_bucket_requires_membership() {
        let ctx = ctx();
        let own = request(BucketType::Organizational, ctx.org_id);
        assert!(local_decision(&ctx, &own).is_allowed());

        let other = request(BucketType::Organizational, Uuid::new_v4());
        assert!(matches!(
            local_decision(&ctx, &other),
            AccessDecision::Denied { .. }
        ));
    }

    #[test]
    fn test_org_bucket_not_readable_by_owner_of_other_org() {
        // A user's personal id matching an org bucket id must not grant access.
        let ctx = ctx();
        let lookalike = request(BucketType::Organizational, ctx.user_id);
        assert!(!local_decision(&ctx, &lookalike).is_allowed());
    }
}
