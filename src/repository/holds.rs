//! Holds repository for database operations
//!
//! The queue per title is ordered by placed_at (id as tie-breaker); the
//! queue head is always the row every assignment goes to. Methods that lock
//! take an explicit [`LockMode`] because the legal mode depends on which
//! side of the lock-order invariant the caller is on.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Pool, Postgres, Row};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::hold::{Hold, HoldStatus},
    pagination::{Cursor, Page},
    repository::LockMode,
};

#[derive(Clone)]
pub struct HoldsRepository {
    pool: Pool<Postgres>,
}

fn map_hold(row: &PgRow) -> AppResult<Hold> {
    let status: String = row.get("status");
    Ok(Hold {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        bibliographic_id: row.get("bibliographic_id"),
        user_id: row.get("user_id"),
        pickup_location_id: row.get("pickup_location_id"),
        placed_at: row.get("placed_at"),
        status: HoldStatus::parse(&status)?,
        assigned_item_id: row.get("assigned_item_id"),
        ready_at: row.get("ready_at"),
        ready_until: row.get("ready_until"),
        cancelled_at: row.get("cancelled_at"),
        fulfilled_at: row.get("fulfilled_at"),
    })
}

impl HoldsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get hold by ID (plain read, no lock)
    pub async fn get_by_id(&self, org_id: Uuid, id: Uuid) -> AppResult<Hold> {
        let row = sqlx::query("SELECT * FROM holds WHERE organization_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Hold {} not found", id)))?;
        map_hold(&row)
    }

    /// Lock a hold row by id
    pub async fn lock_by_id(
        &self,
        conn: &mut PgConnection,
        org_id: Uuid,
        id: Uuid,
    ) -> AppResult<Hold> {
        let row =
            sqlx::query("SELECT * FROM holds WHERE organization_id = $1 AND id = $2 FOR UPDATE")
                .bind(org_id)
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Hold {} not found", id)))?;
        map_hold(&row)
    }

    /// The borrower's active (queued or ready) hold on a title, if any
    pub async fn active_for_user_title(
        &self,
        conn: &mut PgConnection,
        org_id: Uuid,
        user_id: Uuid,
        bibliographic_id: Uuid,
    ) -> AppResult<Option<Hold>> {
        let row = sqlx::query(
            "SELECT * FROM holds \
             WHERE organization_id = $1 AND user_id = $2 AND bibliographic_id = $3 \
               AND status IN ('queued', 'ready')",
        )
        .bind(org_id)
        .bind(user_id)
        .bind(bibliographic_id)
        .fetch_optional(&mut *conn)
        .await?;
        row.as_ref().map(map_hold).transpose()
    }

    /// Count a borrower's active holds
    pub async fn count_active_for_user(
        &self,
        conn: &mut PgConnection,
        org_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM holds \
             WHERE organization_id = $1 AND user_id = $2 AND status IN ('queued', 'ready')",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }

    /// Is anybody queued for this title?
    pub async fn queued_exists_for_title(
        &self,
        conn: &mut PgConnection,
        org_id: Uuid,
        bibliographic_id: Uuid,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM holds \
             WHERE organization_id = $1 AND bibliographic_id = $2 AND status = 'queued')",
        )
        .bind(org_id)
        .bind(bibliographic_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(exists)
    }

    /// Insert a queued hold
    pub async fn insert_queued(
        &self,
        conn: &mut PgConnection,
        org_id: Uuid,
        bibliographic_id: Uuid,
        user_id: Uuid,
        pickup_location_id: Uuid,
        placed_at: DateTime<Utc>,
    ) -> AppResult<Hold> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO holds (id, organization_id, bibliographic_id, user_id, pickup_location_id, placed_at, status) \
             VALUES ($1, $2, $3, $4, $5, $6, 'queued')",
        )
        .bind(id)
        .bind(org_id)
        .bind(bibliographic_id)
        .bind(user_id)
        .bind(pickup_location_id)
        .bind(placed_at)
        .execute(&mut *conn)
        .await?;

        Ok(Hold {
            id,
            organization_id: org_id,
            bibliographic_id,
            user_id,
            pickup_location_id,
            placed_at,
            status: HoldStatus::Queued,
            assigned_item_id: None,
            ready_at: None,
            ready_until: None,
            cancelled_at: None,
            fulfilled_at: None,
        })
    }

    /// Lock the queue head for a title: the oldest still-queued hold.
    ///
    /// One row only; FIFO order is placed_at with id as tie-breaker.
    pub async fn lock_queue_head(
        &self,
        conn: &mut PgConnection,
        org_id: Uuid,
        bibliographic_id: Uuid,
        mode: LockMode,
    ) -> AppResult<Option<Hold>> {
        let sql = format!(
            "SELECT * FROM holds \
             WHERE organization_id = $1 AND bibliographic_id = $2 AND status = 'queued' \
             ORDER BY placed_at ASC, id ASC \
             LIMIT 1 {}",
            mode.row_clause()
        );
        let row = sqlx::query(&sql)
            .bind(org_id)
            .bind(bibliographic_id)
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(map_hold).transpose()
    }

    /// Promote a queued hold to ready with an assigned item and deadline
    pub async fn mark_ready(
        &self,
        conn: &mut PgConnection,
        hold_id: Uuid,
        item_id: Uuid,
        ready_at: DateTime<Utc>,
        ready_until: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE holds SET status = 'ready', assigned_item_id = $1, ready_at = $2, ready_until = $3 \
             WHERE id = $4",
        )
        .bind(item_id)
        .bind(ready_at)
        .bind(ready_until)
        .bind(hold_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Cancel an active hold; the assignment is cleared here, the item is
    /// the caller's responsibility
    pub async fn mark_cancelled(
        &self,
        conn: &mut PgConnection,
        hold_id: Uuid,
        cancelled_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE holds SET status = 'cancelled', assigned_item_id = NULL, cancelled_at = $1 \
             WHERE id = $2",
        )
        .bind(cancelled_at)
        .bind(hold_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Close out a ready hold as picked up.
    ///
    /// The assignment is cleared: only ready holds carry an assigned item,
    /// the loan record owns the item from here on.
    pub async fn mark_fulfilled(
        &self,
        conn: &mut PgConnection,
        hold_id: Uuid,
        fulfilled_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE holds SET status = 'fulfilled', assigned_item_id = NULL, fulfilled_at = $1 \
             WHERE id = $2",
        )
        .bind(fulfilled_at)
        .bind(hold_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Expire a ready hold whose pickup window lapsed
    pub async fn mark_expired(&self, conn: &mut PgConnection, hold_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE holds SET status = 'expired', assigned_item_id = NULL WHERE id = $1")
            .bind(hold_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Ready holds past their pickup deadline, most overdue first.
    ///
    /// Plain read used to pick the working set for one sweep; each id is
    /// re-checked under lock by `lock_expiry_candidate` before processing.
    pub async fn expired_ready_candidates(
        &self,
        org_id: Uuid,
        as_of: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Hold>> {
        let rows = sqlx::query(
            "SELECT * FROM holds \
             WHERE organization_id = $1 AND status = 'ready' AND ready_until < $2 \
             ORDER BY ready_until ASC \
             LIMIT $3",
        )
        .bind(org_id)
        .bind(as_of)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_hold).collect()
    }

    /// Re-select one expiry candidate under a non-blocking lock.
    ///
    /// Returns None when the row is locked by a concurrent fulfill/cancel
    /// or no longer matches; the sweep skips it rather than waiting.
    pub async fn lock_expiry_candidate(
        &self,
        conn: &mut PgConnection,
        hold_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> AppResult<Option<Hold>> {
        let row = sqlx::query(
            "SELECT * FROM holds \
             WHERE id = $1 AND status = 'ready' AND ready_until < $2 \
             FOR UPDATE SKIP LOCKED",
        )
        .bind(hold_id)
        .bind(as_of)
        .fetch_optional(&mut *conn)
        .await?;
        row.as_ref().map(map_hold).transpose()
    }

    /// List holds with optional filters, newest first, cursor-paginated
    pub async fn list(
        &self,
        org_id: Uuid,
        status: Option<HoldStatus>,
        user_id: Option<Uuid>,
        bibliographic_id: Option<Uuid>,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> AppResult<Page<Hold>> {
        let sql = "SELECT * FROM holds \
             WHERE organization_id = $1 \
               AND ($2::text IS NULL OR status = $2) \
               AND ($3::uuid IS NULL OR user_id = $3) \
               AND ($4::uuid IS NULL OR bibliographic_id = $4) \
               AND ($5::timestamptz IS NULL OR (placed_at, id) < ($5, $6)) \
             ORDER BY placed_at DESC, id DESC \
             LIMIT $7";

        let rows = sqlx::query(sql)
            .bind(org_id)
            .bind(status.map(|s| s.as_code()))
            .bind(user_id)
            .bind(bibliographic_id)
            .bind(cursor.map(|c| c.sort_key))
            .bind(cursor.map(|c| c.id).unwrap_or_else(Uuid::nil))
            .bind(limit + 1)
            .fetch_all(&self.pool)
            .await?;

        let mut holds = rows
            .iter()
            .map(map_hold)
            .collect::<AppResult<Vec<Hold>>>()?;
        let next_cursor = if holds.len() as i64 > limit {
            holds.truncate(limit as usize);
            holds.last().map(|h| Cursor::new(h.placed_at, h.id).encode())
        } else {
            None
        };
        Ok(Page {
            items: holds,
            next_cursor,
        })
    }
}
