//! API handlers for the circulation REST endpoints

pub mod circulation;
pub mod health;
pub mod holds;
pub mod jobs;
pub mod openapi;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::{error::AppError, AppState};

const ORG_HEADER: &str = "x-org-id";

/// Extractor for the organization scope.
///
/// Authentication/session mechanics live in front of this service; by the
/// time a request lands here the gateway has resolved the org and passes it
/// as the X-Org-Id header.
pub struct OrgScope(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for OrgScope {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ORG_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Validation("Missing X-Org-Id header".to_string()))?;

        let org_id = Uuid::parse_str(value)
            .map_err(|_| AppError::Validation("Malformed X-Org-Id header".to_string()))?;

        Ok(OrgScope(org_id))
    }
}
