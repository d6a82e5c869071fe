//! Background job service
//!
//! Enqueue/inspect jobs and execute claimed ones. Execution is invoked by
//! the worker loop; the engine itself never retries — the queue's bounded
//! attempts counter is the only retry mechanism.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::job::{BackgroundJob, ExpireReadyPayload, JobKind},
    repository::Repository,
    services::{
        holds::{ExpireMode, HoldsService},
        require_active_staff,
    },
};

/// Sweep bound when the payload does not name one
pub const DEFAULT_EXPIRE_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct JobsService {
    repository: Repository,
    holds: HoldsService,
}

impl JobsService {
    pub fn new(repository: Repository, holds: HoldsService) -> Self {
        Self { repository, holds }
    }

    /// Enqueue an expire-ready-holds job (staff only)
    pub async fn enqueue_expire_ready(
        &self,
        org_id: Uuid,
        payload: ExpireReadyPayload,
        run_at: Option<DateTime<Utc>>,
    ) -> AppResult<BackgroundJob> {
        let repo = &self.repository;

        let mut conn = repo.pool.acquire().await?;
        let actor = repo
            .users
            .get_by_id(&mut conn, org_id, payload.actor_user_id)
            .await?;
        require_active_staff(&actor)?;
        drop(conn);

        if let Some(limit) = payload.limit {
            if limit <= 0 {
                return Err(AppError::Validation(
                    "limit must be a positive number".to_string(),
                ));
            }
        }

        let payload_json = serde_json::to_value(&payload)
            .map_err(|e| AppError::Internal(format!("Failed to serialize job payload: {}", e)))?;
        let job = repo
            .jobs
            .enqueue(org_id, JobKind::ExpireReadyHolds, payload_json, run_at)
            .await?;

        tracing::info!(job_id = %job.id, kind = job.kind.as_code(), "job enqueued");
        Ok(job)
    }

    /// Get job status/result by id
    pub async fn get_status(&self, org_id: Uuid, job_id: Uuid) -> AppResult<BackgroundJob> {
        self.repository.jobs.get_by_id(org_id, job_id).await
    }

    /// Claim the next eligible job for a worker, if any
    pub async fn claim_next(&self, worker_id: &str) -> AppResult<Option<BackgroundJob>> {
        self.repository.jobs.claim_next(worker_id).await
    }

    /// Execute a claimed job and return its result payload
    pub async fn execute(&self, job: &BackgroundJob) -> AppResult<serde_json::Value> {
        match job.kind {
            JobKind::ExpireReadyHolds => {
                let payload: ExpireReadyPayload = serde_json::from_value(job.payload.clone())
                    .map_err(|e| AppError::Validation(format!("Malformed job payload: {}", e)))?;
                let as_of = payload.as_of.unwrap_or_else(Utc::now);
                let limit = payload.limit.unwrap_or(DEFAULT_EXPIRE_LIMIT);
                let summary = self
                    .holds
                    .expire_ready(
                        job.organization_id,
                        payload.actor_user_id,
                        as_of,
                        limit,
                        ExpireMode::Apply,
                    )
                    .await?;
                serde_json::to_value(&summary)
                    .map_err(|e| AppError::Internal(format!("Failed to serialize summary: {}", e)))
            }
        }
    }

    /// Finalize a job after execution
    pub async fn finalize(
        &self,
        job: &BackgroundJob,
        outcome: Result<serde_json::Value, AppError>,
    ) -> AppResult<()> {
        match outcome {
            Ok(result) => {
                self.repository.jobs.mark_succeeded(job.id, result).await?;
                tracing::info!(job_id = %job.id, "job succeeded");
            }
            Err(err) => {
                let message = err.to_string();
                self.repository.jobs.mark_failed(job.id, &message).await?;
                tracing::warn!(job_id = %job.id, error = %message, "job failed");
            }
        }
        Ok(())
    }
}
