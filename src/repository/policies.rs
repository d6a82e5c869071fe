//! Circulation policies repository
//!
//! Pure read. The owning store guarantees one active policy per role; when
//! none resolves the caller gets `PolicyNotFound` — limits never silently
//! default to unlimited.

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Pool, Postgres, Row};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::policy::CirculationPolicy,
    models::user::UserRole,
};

#[derive(Clone)]
pub struct PoliciesRepository {
    pool: Pool<Postgres>,
}

fn map_policy(row: &PgRow) -> AppResult<CirculationPolicy> {
    let role: String = row.get("audience_role");
    Ok(CirculationPolicy {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        code: row.get("code"),
        name: row.get("name"),
        audience_role: UserRole::parse(&role)?,
        loan_days: row.get("loan_days"),
        max_loans: row.get("max_loans"),
        max_renewals: row.get("max_renewals"),
        max_holds: row.get("max_holds"),
        hold_pickup_days: row.get("hold_pickup_days"),
        overdue_block_days: row.get("overdue_block_days"),
        is_active: row.get("is_active"),
    })
}

impl PoliciesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Resolve the single active policy for a borrower role
    pub async fn resolve_active(
        &self,
        conn: &mut PgConnection,
        org_id: Uuid,
        role: UserRole,
    ) -> AppResult<CirculationPolicy> {
        let row = sqlx::query(
            "SELECT * FROM circulation_policies \
             WHERE organization_id = $1 AND audience_role = $2 AND is_active",
        )
        .bind(org_id)
        .bind(role.as_code())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| {
            AppError::PolicyNotFound(format!("No active policy for role {}", role.as_code()))
        })?;
        map_policy(&row)
    }
}
