//! Circulation policy model

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::user::UserRole;

/// Per-role lending policy. Exactly one policy is active per role; the
/// engine never substitutes defaults when resolution fails.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CirculationPolicy {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub code: String,
    pub name: String,
    pub audience_role: UserRole,
    pub loan_days: i32,
    pub max_loans: i32,
    pub max_renewals: i32,
    pub max_holds: i32,
    pub hold_pickup_days: i32,
    pub overdue_block_days: i32,
    pub is_active: bool,
}
