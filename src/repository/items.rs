//! Items repository for database operations
//!
//! Every status change goes through [`ItemsRepository::set_status`], which
//! validates against the central transition table before writing. Callers
//! must hold the item's row lock (acquired via one of the lock_* methods)
//! for the duration of the operation.

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Pool, Postgres, Row};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::item::{Item, ItemStatus},
    repository::LockMode,
};

#[derive(Clone)]
pub struct ItemsRepository {
    pool: Pool<Postgres>,
}

fn map_item(row: &PgRow) -> AppResult<Item> {
    let status: String = row.get("status");
    Ok(Item {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        bibliographic_id: row.get("bibliographic_id"),
        barcode: row.get("barcode"),
        call_number: row.get("call_number"),
        location_id: row.get("location_id"),
        status: ItemStatus::parse(&status)?,
        acquired_at: row.get("acquired_at"),
        last_inventory_at: row.get("last_inventory_at"),
        notes: row.get("notes"),
    })
}

impl ItemsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get item by barcode (plain read, no lock)
    pub async fn get_by_barcode(&self, org_id: Uuid, barcode: &str) -> AppResult<Item> {
        let row = sqlx::query(
            "SELECT * FROM item_copies WHERE organization_id = $1 AND barcode = $2",
        )
        .bind(org_id)
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item with barcode {} not found", barcode)))?;
        map_item(&row)
    }

    /// Lock an item row by barcode for the duration of the transaction
    pub async fn lock_by_barcode(
        &self,
        conn: &mut PgConnection,
        org_id: Uuid,
        barcode: &str,
    ) -> AppResult<Item> {
        let row = sqlx::query(
            "SELECT * FROM item_copies WHERE organization_id = $1 AND barcode = $2 FOR UPDATE",
        )
        .bind(org_id)
        .bind(barcode)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item with barcode {} not found", barcode)))?;
        map_item(&row)
    }

    /// Lock an item row by id
    pub async fn lock_by_id(&self, conn: &mut PgConnection, id: Uuid) -> AppResult<Item> {
        let row = sqlx::query("SELECT * FROM item_copies WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", id)))?;
        map_item(&row)
    }

    /// Lock one available copy of a title, if any.
    ///
    /// Skip-locked so concurrent hold creations on different copies of the
    /// same title proceed without blocking each other.
    pub async fn lock_available_for_title(
        &self,
        conn: &mut PgConnection,
        org_id: Uuid,
        bibliographic_id: Uuid,
        mode: LockMode,
    ) -> AppResult<Option<Item>> {
        let sql = format!(
            "SELECT * FROM item_copies \
             WHERE organization_id = $1 AND bibliographic_id = $2 AND status = 'available' \
             ORDER BY barcode \
             LIMIT 1 {}",
            mode.row_clause()
        );
        let row = sqlx::query(&sql)
            .bind(org_id)
            .bind(bibliographic_id)
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(map_item).transpose()
    }

    /// Transition an item to a new status.
    ///
    /// Fails with `InvalidTransition` for any pair outside the table; the
    /// caller must already hold the row lock.
    pub async fn set_status(
        &self,
        conn: &mut PgConnection,
        item: &Item,
        to: ItemStatus,
    ) -> AppResult<Item> {
        item.status.validate_transition(to)?;
        sqlx::query("UPDATE item_copies SET status = $1 WHERE id = $2")
            .bind(to.as_code())
            .bind(item.id)
            .execute(&mut *conn)
            .await?;
        let mut updated = item.clone();
        updated.status = to;
        Ok(updated)
    }
}
