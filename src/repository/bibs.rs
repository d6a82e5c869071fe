//! Bibliographic records repository — title existence contract
//!
//! The catalog itself is managed elsewhere; circulation only ever asks
//! whether a title exists in scope.

use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Clone)]
pub struct BibsRepository {
    #[allow(dead_code)]
    pool: Pool<Postgres>,
}

impl BibsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn title_exists(
        &self,
        conn: &mut PgConnection,
        org_id: Uuid,
        bibliographic_id: Uuid,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM bibliographic_records WHERE organization_id = $1 AND id = $2)",
        )
        .bind(org_id)
        .bind(bibliographic_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(exists)
    }
}
