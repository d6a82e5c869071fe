//! Locations repository — pickup location lookup contract

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Pool, Postgres, Row};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::location::{Location, LocationStatus},
};

#[derive(Clone)]
pub struct LocationsRepository {
    pool: Pool<Postgres>,
}

fn map_location(row: &PgRow) -> AppResult<Location> {
    let status: String = row.get("status");
    Ok(Location {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        code: row.get("code"),
        name: row.get("name"),
        status: LocationStatus::parse(&status)?,
    })
}

impl LocationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get location by ID
    pub async fn get_by_id(
        &self,
        conn: &mut PgConnection,
        org_id: Uuid,
        id: Uuid,
    ) -> AppResult<Location> {
        let row = sqlx::query(
            "SELECT id, organization_id, code, name, status FROM locations \
             WHERE organization_id = $1 AND id = $2",
        )
        .bind(org_id)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Location {} not found", id)))?;
        map_location(&row)
    }
}
