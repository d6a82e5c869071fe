//! Circulation desk endpoints (checkout, checkin, renew, item status)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::item::{Item, ItemStatus},
    models::loan::{Loan, LoanStatus},
    pagination::Page,
    services::circulation::{CheckinOutcome, RenewOutcome},
};

use super::OrgScope;

/// Checkout request
#[derive(Deserialize, ToSchema)]
pub struct CheckoutRequest {
    /// Staff member operating the desk
    pub actor_user_id: Uuid,
    /// Borrower's external identifier (student/staff number)
    pub borrower_external_id: String,
    /// Barcode of the copy being borrowed
    pub item_barcode: String,
}

/// Checkin request
#[derive(Deserialize, ToSchema)]
pub struct CheckinRequest {
    pub actor_user_id: Uuid,
    pub item_barcode: String,
}

/// Renew request
#[derive(Deserialize, ToSchema)]
pub struct RenewRequest {
    pub actor_user_id: Uuid,
}

/// Staff item status change request
#[derive(Deserialize, ToSchema)]
pub struct ItemStatusRequest {
    pub actor_user_id: Uuid,
    /// Target status (lost, repair, withdrawn, available)
    pub status: ItemStatus,
}

/// Loan listing filters
#[derive(Deserialize, IntoParams)]
pub struct LoanListQuery {
    pub status: Option<LoanStatus>,
    pub user_id: Option<Uuid>,
    /// Opaque cursor from a previous page
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// Check an item out to a borrower
#[utoipa::path(
    post,
    path = "/circulation/checkout",
    tag = "circulation",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 404, description = "Actor, borrower or item not found"),
        (status = 409, description = "Item not available, limit reached or borrower blocked")
    )
)]
pub async fn checkout(
    State(state): State<crate::AppState>,
    OrgScope(org_id): OrgScope,
    Json(request): Json<CheckoutRequest>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    let loan = state
        .services
        .circulation
        .checkout(
            org_id,
            request.actor_user_id,
            &request.borrower_external_id,
            &request.item_barcode,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Return a checked-out item
#[utoipa::path(
    post,
    path = "/circulation/checkin",
    tag = "circulation",
    request_body = CheckinRequest,
    responses(
        (status = 200, description = "Item returned", body = CheckinOutcome),
        (status = 404, description = "Item or open loan not found"),
        (status = 409, description = "Item state inconsistent")
    )
)]
pub async fn checkin(
    State(state): State<crate::AppState>,
    OrgScope(org_id): OrgScope,
    Json(request): Json<CheckinRequest>,
) -> AppResult<Json<CheckinOutcome>> {
    let outcome = state
        .services
        .circulation
        .checkin(org_id, request.actor_user_id, &request.item_barcode)
        .await?;
    Ok(Json(outcome))
}

/// Renew a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/renew",
    tag = "circulation",
    params(("id" = Uuid, Path, description = "Loan ID")),
    request_body = RenewRequest,
    responses(
        (status = 200, description = "Loan renewed", body = RenewOutcome),
        (status = 403, description = "Actor may not renew this loan"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Renewal limit reached or queue blocks renewal")
    )
)]
pub async fn renew_loan(
    State(state): State<crate::AppState>,
    OrgScope(org_id): OrgScope,
    Path(loan_id): Path<Uuid>,
    Json(request): Json<RenewRequest>,
) -> AppResult<Json<RenewOutcome>> {
    let outcome = state
        .services
        .circulation
        .renew(org_id, request.actor_user_id, loan_id)
        .await?;
    Ok(Json(outcome))
}

/// Staff action: move an item to lost/repair/withdrawn or recover it
#[utoipa::path(
    post,
    path = "/items/{barcode}/status",
    tag = "circulation",
    params(("barcode" = String, Path, description = "Item barcode")),
    request_body = ItemStatusRequest,
    responses(
        (status = 200, description = "Item status changed", body = Item),
        (status = 404, description = "Item not found"),
        (status = 409, description = "Transition not allowed")
    )
)]
pub async fn set_item_status(
    State(state): State<crate::AppState>,
    OrgScope(org_id): OrgScope,
    Path(barcode): Path<String>,
    Json(request): Json<ItemStatusRequest>,
) -> AppResult<Json<Item>> {
    let item = state
        .services
        .circulation
        .set_item_status(org_id, request.actor_user_id, &barcode, request.status)
        .await?;
    Ok(Json(item))
}

/// List loans
#[utoipa::path(
    get,
    path = "/loans",
    tag = "circulation",
    params(LoanListQuery),
    responses(
        (status = 200, description = "One page of loans")
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    OrgScope(org_id): OrgScope,
    Query(query): Query<LoanListQuery>,
) -> AppResult<Json<Page<Loan>>> {
    let page = state
        .services
        .circulation
        .list_loans(
            org_id,
            query.status,
            query.user_id,
            query.cursor,
            query.limit.unwrap_or(50),
        )
        .await?;
    Ok(Json(page))
}
