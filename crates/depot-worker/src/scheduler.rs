//! Cron scheduler for periodic maintenance tasks.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use depot_core::config::worker::WorkerConfig;
use depot_core::error::AppError;
use depot_service::{ReconciliationEngine, ScanMode};

/// Cron-based scheduler for periodic background tasks
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Reconciliation engine driven by the scheduled scan
    engine: Arc<ReconciliationEngine>,
    /// Worker configuration
    config: WorkerConfig,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new(engine: Arc<ReconciliationEngine>, config: WorkerConfig) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            engine,
            config,
        })
    }

    /// Register all default scheduled tasks
    pub async fn register_default_tasks(&self) -> Result<(), AppError> {
        self.register_reconcile_scan().await?;

        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }

    /// Reconciliation scan on the configured cron schedule
    async fn register_reconcile_scan(&self) -> Result<(), AppError> {
        let engine = Arc::clone(&self.engine);
        let mode = if self.config.reconcile_fix {
            ScanMode::Fix
        } else {
            ScanMode::Report
        };

        let job = CronJob::new_async(self.config.reconcile_schedule.as_str(), move |_uuid, _lock| {
            let engine = Arc::clone(&engine);
            Box::pin(async move {
                tracing::debug!("Running scheduled reconciliation scan");
                match engine.scan(mode).await {
                    Ok(report) => {
                        if report.has_findings() || !report.is_complete() {
                            tracing::warn!(
                                missing = report.missing.len(),
                                orphans = report.orphan_objects.len(),
                                complete = report.is_complete(),
                                "Scheduled reconciliation found drift"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!("Scheduled reconciliation scan failed: {}", e);
                    }
                }
            })
        })
        .map_err(|e| {
            AppError::internal(format!("Failed to create reconcile_scan schedule: {}", e))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add reconcile_scan schedule: {}", e))
        })?;

        tracing::info!(
            schedule = %self.config.reconcile_schedule,
            fix = self.config.reconcile_fix,
            "Registered: reconcile_scan"
        );
        Ok(())
    }
}
