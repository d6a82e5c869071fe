//! Background jobs repository — a durable work queue shared by workers
//!
//! Claiming is a single atomic statement with non-blocking row selection,
//! so several worker processes can share the queue without double
//! processing. Attempts are incremented on claim only; once attempts
//! reaches max_attempts the row is never claimed again.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::job::{BackgroundJob, JobKind, JobStatus},
};

/// Bound on the stored failure message; large internal error payloads
/// must not leak into the queue table.
const MAX_ERROR_LEN: usize = 2000;

#[derive(Clone)]
pub struct JobsRepository {
    pool: Pool<Postgres>,
}

fn map_job(row: &PgRow) -> AppResult<BackgroundJob> {
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    Ok(BackgroundJob {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        kind: JobKind::parse(&kind)?,
        status: JobStatus::parse(&status)?,
        payload: row.get("payload"),
        result: row.get("result"),
        last_error: row.get("last_error"),
        attempts: row.get("attempts"),
        max_attempts: row.get("max_attempts"),
        run_at: row.get("run_at"),
        locked_by: row.get("locked_by"),
        locked_at: row.get("locked_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl JobsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get job by ID
    pub async fn get_by_id(&self, org_id: Uuid, id: Uuid) -> AppResult<BackgroundJob> {
        let row =
            sqlx::query("SELECT * FROM background_jobs WHERE organization_id = $1 AND id = $2")
                .bind(org_id)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;
        map_job(&row)
    }

    /// Insert a queued job
    pub async fn enqueue(
        &self,
        org_id: Uuid,
        kind: JobKind,
        payload: serde_json::Value,
        run_at: Option<DateTime<Utc>>,
    ) -> AppResult<BackgroundJob> {
        let id = Uuid::new_v4();
        let row = sqlx::query(
            "INSERT INTO background_jobs (id, organization_id, kind, payload, run_at) \
             VALUES ($1, $2, $3, $4, COALESCE($5, now())) \
             RETURNING *",
        )
        .bind(id)
        .bind(org_id)
        .bind(kind.as_code())
        .bind(payload)
        .bind(run_at)
        .fetch_one(&self.pool)
        .await?;
        map_job(&row)
    }

    /// Atomically claim the oldest eligible queued job for a worker.
    ///
    /// The inner select uses SKIP LOCKED so two concurrent claims never
    /// both succeed for the same row; the flip to running, lock stamp and
    /// attempt increment happen in the same statement.
    pub async fn claim_next(&self, worker_id: &str) -> AppResult<Option<BackgroundJob>> {
        let row = sqlx::query(
            "UPDATE background_jobs \
             SET status = 'running', locked_by = $1, locked_at = now(), \
                 attempts = attempts + 1, updated_at = now() \
             WHERE id = ( \
                 SELECT id FROM background_jobs \
                 WHERE status = 'queued' AND run_at <= now() AND attempts < max_attempts \
                 ORDER BY run_at ASC, created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING *",
        )
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_job).transpose()
    }

    /// Finalize a running job as succeeded
    pub async fn mark_succeeded(
        &self,
        id: Uuid,
        result: serde_json::Value,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE background_jobs \
             SET status = 'succeeded', result = $1, locked_by = NULL, locked_at = NULL, updated_at = now() \
             WHERE id = $2",
        )
        .bind(result)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Finalize a running job as failed; re-queue while attempts remain.
    ///
    /// The job goes back to queued so a later claim can retry it; once
    /// attempts has reached max_attempts the claim filter excludes it and
    /// the row stays failed.
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> AppResult<()> {
        let truncated: String = error.chars().take(MAX_ERROR_LEN).collect();
        sqlx::query(
            "UPDATE background_jobs \
             SET status = CASE WHEN attempts < max_attempts THEN 'queued' ELSE 'failed' END, \
                 last_error = $1, locked_by = NULL, locked_at = NULL, updated_at = now() \
             WHERE id = $2",
        )
        .bind(truncated)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
