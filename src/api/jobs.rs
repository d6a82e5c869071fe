//! Background job endpoints (enqueue, status)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::job::{BackgroundJob, ExpireReadyPayload},
};

use super::OrgScope;

/// Enqueue expire-ready-holds request
#[derive(Deserialize, ToSchema)]
pub struct EnqueueExpireReadyRequest {
    pub actor_user_id: Uuid,
    /// Deadline reference; the worker defaults to its run time
    pub as_of: Option<DateTime<Utc>>,
    /// Batch bound per run
    pub limit: Option<i64>,
    pub note: Option<String>,
    /// Earliest time the job may run; defaults to now
    pub run_at: Option<DateTime<Utc>>,
}

/// Enqueue a hold expiry job
#[utoipa::path(
    post,
    path = "/jobs/expire-ready-holds",
    tag = "jobs",
    request_body = EnqueueExpireReadyRequest,
    responses(
        (status = 202, description = "Job queued", body = BackgroundJob),
        (status = 403, description = "Actor is not staff")
    )
)]
pub async fn enqueue_expire_ready(
    State(state): State<crate::AppState>,
    OrgScope(org_id): OrgScope,
    Json(request): Json<EnqueueExpireReadyRequest>,
) -> AppResult<(StatusCode, Json<BackgroundJob>)> {
    let payload = ExpireReadyPayload {
        actor_user_id: request.actor_user_id,
        as_of: request.as_of,
        limit: request.limit,
        note: request.note,
    };
    let job = state
        .services
        .jobs
        .enqueue_expire_ready(org_id, payload, request.run_at)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// Get job status and result
#[utoipa::path(
    get,
    path = "/jobs/{id}",
    tag = "jobs",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job", body = BackgroundJob),
        (status = 404, description = "Job not found")
    )
)]
pub async fn get_job(
    State(state): State<crate::AppState>,
    OrgScope(org_id): OrgScope,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<BackgroundJob>> {
    let job = state.services.jobs.get_status(org_id, job_id).await?;
    Ok(Json(job))
}
