//! Audit events repository
//!
//! Events are written on the caller's connection so they commit (or roll
//! back) atomically with the state change they describe.

use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Clone)]
pub struct AuditRepository {
    #[allow(dead_code)]
    pool: Pool<Postgres>,
}

impl AuditRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Record one audit event inside the caller's transaction
    pub async fn record(
        &self,
        conn: &mut PgConnection,
        org_id: Uuid,
        actor_user_id: Option<Uuid>,
        action: &str,
        entity_type: &str,
        entity_id: &str,
        metadata: serde_json::Value,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO audit_events (id, organization_id, actor_user_id, action, entity_type, entity_id, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(actor_user_id)
        .bind(action)
        .bind(entity_type)
        .bind(entity_id)
        .bind(metadata)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}
