//! Hold queue endpoints (place, cancel, fulfill, list, expiry maintenance)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::hold::{Hold, HoldStatus},
    models::job::ExpireReadySummary,
    pagination::Page,
    services::holds::{ExpireMode, FulfillOutcome},
};

use super::OrgScope;

/// Place hold request
#[derive(Deserialize, ToSchema)]
pub struct CreateHoldRequest {
    /// Staff member acting for the borrower; omit for self-service
    pub actor_user_id: Option<Uuid>,
    pub borrower_external_id: String,
    pub bibliographic_id: Uuid,
    pub pickup_location_id: Uuid,
}

/// Cancel hold request
#[derive(Deserialize, ToSchema)]
pub struct CancelHoldRequest {
    /// Staff member cancelling; omit for self-service by the hold's owner
    pub actor_user_id: Option<Uuid>,
}

/// Fulfill hold request (staff only)
#[derive(Deserialize, ToSchema)]
pub struct FulfillHoldRequest {
    pub actor_user_id: Uuid,
}

/// Direct expiry sweep request
#[derive(Deserialize, ToSchema)]
pub struct ExpireReadyRequest {
    pub actor_user_id: Uuid,
    /// Deadline reference; defaults to now
    pub as_of: Option<DateTime<Utc>>,
    /// Batch bound; defaults to 100
    pub limit: Option<i64>,
    pub mode: ExpireMode,
}

/// Hold listing filters
#[derive(Deserialize, IntoParams)]
pub struct HoldListQuery {
    pub status: Option<HoldStatus>,
    pub user_id: Option<Uuid>,
    pub bibliographic_id: Option<Uuid>,
    /// Opaque cursor from a previous page
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// Place a hold on a title
#[utoipa::path(
    post,
    path = "/holds",
    tag = "holds",
    request_body = CreateHoldRequest,
    responses(
        (status = 201, description = "Hold placed (queued, or ready if a copy was free)", body = Hold),
        (status = 404, description = "Borrower, title or location not found"),
        (status = 409, description = "Duplicate hold or hold limit reached")
    )
)]
pub async fn create_hold(
    State(state): State<crate::AppState>,
    OrgScope(org_id): OrgScope,
    Json(request): Json<CreateHoldRequest>,
) -> AppResult<(StatusCode, Json<Hold>)> {
    let hold = state
        .services
        .holds
        .create_hold(
            org_id,
            &request.borrower_external_id,
            request.bibliographic_id,
            request.pickup_location_id,
            request.actor_user_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(hold)))
}

/// Cancel a queued or ready hold
#[utoipa::path(
    post,
    path = "/holds/{id}/cancel",
    tag = "holds",
    params(("id" = Uuid, Path, description = "Hold ID")),
    request_body = CancelHoldRequest,
    responses(
        (status = 200, description = "Hold cancelled", body = Hold),
        (status = 404, description = "Hold not found"),
        (status = 409, description = "Hold already in a terminal state")
    )
)]
pub async fn cancel_hold(
    State(state): State<crate::AppState>,
    OrgScope(org_id): OrgScope,
    Path(hold_id): Path<Uuid>,
    Json(request): Json<CancelHoldRequest>,
) -> AppResult<Json<Hold>> {
    let hold = state
        .services
        .holds
        .cancel_hold(org_id, hold_id, request.actor_user_id)
        .await?;
    Ok(Json(hold))
}

/// Fulfill a ready hold: hand the assigned copy to the borrower
#[utoipa::path(
    post,
    path = "/holds/{id}/fulfill",
    tag = "holds",
    params(("id" = Uuid, Path, description = "Hold ID")),
    request_body = FulfillHoldRequest,
    responses(
        (status = 200, description = "Hold fulfilled, loan created", body = FulfillOutcome),
        (status = 404, description = "Hold not found"),
        (status = 409, description = "Hold not ready, expired, or item mismatch")
    )
)]
pub async fn fulfill_hold(
    State(state): State<crate::AppState>,
    OrgScope(org_id): OrgScope,
    Path(hold_id): Path<Uuid>,
    Json(request): Json<FulfillHoldRequest>,
) -> AppResult<Json<FulfillOutcome>> {
    let outcome = state
        .services
        .holds
        .fulfill_hold(org_id, hold_id, request.actor_user_id)
        .await?;
    Ok(Json(outcome))
}

/// Get a hold
#[utoipa::path(
    get,
    path = "/holds/{id}",
    tag = "holds",
    params(("id" = Uuid, Path, description = "Hold ID")),
    responses(
        (status = 200, description = "Hold", body = Hold),
        (status = 404, description = "Hold not found")
    )
)]
pub async fn get_hold(
    State(state): State<crate::AppState>,
    OrgScope(org_id): OrgScope,
    Path(hold_id): Path<Uuid>,
) -> AppResult<Json<Hold>> {
    let hold = state.services.holds.get_hold(org_id, hold_id).await?;
    Ok(Json(hold))
}

/// List holds
#[utoipa::path(
    get,
    path = "/holds",
    tag = "holds",
    params(HoldListQuery),
    responses(
        (status = 200, description = "One page of holds")
    )
)]
pub async fn list_holds(
    State(state): State<crate::AppState>,
    OrgScope(org_id): OrgScope,
    Query(query): Query<HoldListQuery>,
) -> AppResult<Json<Page<Hold>>> {
    let page = state
        .services
        .holds
        .list_holds(
            org_id,
            query.status,
            query.user_id,
            query.bibliographic_id,
            query.cursor,
            query.limit.unwrap_or(50),
        )
        .await?;
    Ok(Json(page))
}

/// Run an expiry sweep synchronously (staff maintenance)
#[utoipa::path(
    post,
    path = "/maintenance/holds/expire-ready",
    tag = "holds",
    request_body = ExpireReadyRequest,
    responses(
        (status = 200, description = "Sweep summary", body = ExpireReadySummary),
        (status = 403, description = "Actor is not staff")
    )
)]
pub async fn expire_ready(
    State(state): State<crate::AppState>,
    OrgScope(org_id): OrgScope,
    Json(request): Json<ExpireReadyRequest>,
) -> AppResult<Json<ExpireReadySummary>> {
    let summary = state
        .services
        .holds
        .expire_ready_manual(
            org_id,
            request.actor_user_id,
            request.as_of.unwrap_or_else(Utc::now),
            request.limit.unwrap_or(crate::services::jobs::DEFAULT_EXPIRE_LIMIT),
            request.mode,
        )
        .await?;
    Ok(Json(summary))
}
