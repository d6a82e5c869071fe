//! Loans repository for database operations

use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Pool, Postgres, Row};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanStatus},
    pagination::{Cursor, Page},
    repository::LockMode,
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

fn map_loan(row: &PgRow) -> AppResult<Loan> {
    let status: String = row.get("status");
    Ok(Loan {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        item_id: row.get("item_id"),
        user_id: row.get("user_id"),
        checked_out_at: row.get("checked_out_at"),
        due_at: row.get("due_at"),
        returned_at: row.get("returned_at"),
        renewed_count: row.get("renewed_count"),
        status: LoanStatus::parse(&status)?,
    })
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID (plain read, no lock)
    pub async fn get_by_id(&self, org_id: Uuid, id: Uuid) -> AppResult<Loan> {
        let row = sqlx::query("SELECT * FROM loans WHERE organization_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", id)))?;
        map_loan(&row)
    }

    /// Lock a loan row by id.
    ///
    /// Callers must lock the loan's item first; item -> loan is the canonical
    /// lock order for checkout/checkin/renew.
    pub async fn lock_by_id(&self, conn: &mut PgConnection, id: Uuid) -> AppResult<Loan> {
        let row = sqlx::query("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", id)))?;
        map_loan(&row)
    }

    /// Locate and lock the open loan for an item, if any
    pub async fn lock_open_for_item(
        &self,
        conn: &mut PgConnection,
        item_id: Uuid,
        mode: LockMode,
    ) -> AppResult<Option<Loan>> {
        let sql = format!(
            "SELECT * FROM loans WHERE item_id = $1 AND returned_at IS NULL {}",
            mode.row_clause()
        );
        let row = sqlx::query(&sql)
            .bind(item_id)
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(map_loan).transpose()
    }

    /// Count a borrower's open loans
    pub async fn count_open_for_user(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE user_id = $1 AND returned_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }

    /// Does the borrower have an open loan overdue by at least `block_days`?
    pub async fn has_blocking_overdue(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        block_days: i32,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let threshold = now - Duration::days(block_days as i64);
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loans \
             WHERE user_id = $1 AND returned_at IS NULL AND due_at <= $2)",
        )
        .bind(user_id)
        .bind(threshold)
        .fetch_one(&mut *conn)
        .await?;
        Ok(exists)
    }

    /// Insert a new open loan
    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        org_id: Uuid,
        item_id: Uuid,
        user_id: Uuid,
        checked_out_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
    ) -> AppResult<Loan> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO loans (id, organization_id, item_id, user_id, checked_out_at, due_at, renewed_count, status) \
             VALUES ($1, $2, $3, $4, $5, $6, 0, 'open')",
        )
        .bind(id)
        .bind(org_id)
        .bind(item_id)
        .bind(user_id)
        .bind(checked_out_at)
        .bind(due_at)
        .execute(&mut *conn)
        .await?;

        Ok(Loan {
            id,
            organization_id: org_id,
            item_id,
            user_id,
            checked_out_at,
            due_at,
            returned_at: None,
            renewed_count: 0,
            status: LoanStatus::Open,
        })
    }

    /// Close an open loan
    pub async fn close(
        &self,
        conn: &mut PgConnection,
        loan_id: Uuid,
        returned_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query("UPDATE loans SET returned_at = $1, status = 'closed' WHERE id = $2")
            .bind(returned_at)
            .bind(loan_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Extend a loan's due date and bump the renewal count
    pub async fn renew(
        &self,
        conn: &mut PgConnection,
        loan_id: Uuid,
        new_due_at: DateTime<Utc>,
        new_renewed_count: i32,
    ) -> AppResult<()> {
        sqlx::query("UPDATE loans SET due_at = $1, renewed_count = $2 WHERE id = $3")
            .bind(new_due_at)
            .bind(new_renewed_count)
            .bind(loan_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// List loans with optional filters, newest first, cursor-paginated
    pub async fn list(
        &self,
        org_id: Uuid,
        status: Option<LoanStatus>,
        user_id: Option<Uuid>,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> AppResult<Page<Loan>> {
        let sql = "SELECT * FROM loans \
             WHERE organization_id = $1 \
               AND ($2::text IS NULL OR status = $2) \
               AND ($3::uuid IS NULL OR user_id = $3) \
               AND ($4::timestamptz IS NULL OR (checked_out_at, id) < ($4, $5)) \
             ORDER BY checked_out_at DESC, id DESC \
             LIMIT $6";

        let rows = sqlx::query(sql)
            .bind(org_id)
            .bind(status.map(|s| s.as_code()))
            .bind(user_id)
            .bind(cursor.map(|c| c.sort_key))
            .bind(cursor.map(|c| c.id).unwrap_or_else(Uuid::nil))
            .bind(limit + 1)
            .fetch_all(&self.pool)
            .await?;

        let mut loans = rows
            .iter()
            .map(map_loan)
            .collect::<AppResult<Vec<Loan>>>()?;
        let next_cursor = if loans.len() as i64 > limit {
            loans.truncate(limit as usize);
            loans
                .last()
                .map(|l| Cursor::new(l.checked_out_at, l.id).encode())
        } else {
            None
        };
        Ok(Page {
            items: loans,
            next_cursor,
        })
    }
}
