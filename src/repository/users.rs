//! Users repository — the directory lookup contract consumed by circulation

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Pool, Postgres, Row};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::user::{User, UserRole, UserStatus},
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

fn map_user(row: &PgRow) -> AppResult<User> {
    let role: String = row.get("role");
    let status: String = row.get("status");
    Ok(User {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        external_id: row.get("external_id"),
        name: row.get("name"),
        role: UserRole::parse(&role)?,
        org_unit: row.get("org_unit"),
        status: UserStatus::parse(&status)?,
    })
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(
        &self,
        conn: &mut PgConnection,
        org_id: Uuid,
        id: Uuid,
    ) -> AppResult<User> {
        let row = sqlx::query("SELECT * FROM users WHERE organization_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
        map_user(&row)
    }

    /// Get user by external identifier (student/staff number)
    pub async fn get_by_external_id(
        &self,
        conn: &mut PgConnection,
        org_id: Uuid,
        external_id: &str,
    ) -> AppResult<User> {
        let row =
            sqlx::query("SELECT * FROM users WHERE organization_id = $1 AND external_id = $2")
                .bind(org_id)
                .bind(external_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("User with external id {} not found", external_id))
                })?;
        map_user(&row)
    }
}
