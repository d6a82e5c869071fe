//! Hold (title-level reservation) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    Queued,
    Ready,
    Cancelled,
    Fulfilled,
    Expired,
}

impl HoldStatus {
    pub fn as_code(&self) -> &'static str {
        match self {
            HoldStatus::Queued => "queued",
            HoldStatus::Ready => "ready",
            HoldStatus::Cancelled => "cancelled",
            HoldStatus::Fulfilled => "fulfilled",
            HoldStatus::Expired => "expired",
        }
    }

    pub fn parse(code: &str) -> AppResult<Self> {
        match code {
            "queued" => Ok(HoldStatus::Queued),
            "ready" => Ok(HoldStatus::Ready),
            "cancelled" => Ok(HoldStatus::Cancelled),
            "fulfilled" => Ok(HoldStatus::Fulfilled),
            "expired" => Ok(HoldStatus::Expired),
            other => Err(AppError::Validation(format!(
                "Unknown hold status '{}'",
                other
            ))),
        }
    }

    /// Queued and ready holds are the only ones still in play
    pub fn is_active(&self) -> bool {
        matches!(self, HoldStatus::Queued | HoldStatus::Ready)
    }
}

impl std::fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

/// Reservation against a title. An item is only pinned once the hold
/// becomes ready; a queued hold has no assigned item.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Hold {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub bibliographic_id: Uuid,
    pub user_id: Uuid,
    pub pickup_location_id: Uuid,
    pub placed_at: DateTime<Utc>,
    pub status: HoldStatus,
    pub assigned_item_id: Option<Uuid>,
    pub ready_at: Option<DateTime<Utc>>,
    pub ready_until: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub fulfilled_at: Option<DateTime<Utc>>,
}
