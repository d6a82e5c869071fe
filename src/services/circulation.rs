//! Circulation transaction coordinator
//!
//! Checkout, checkin and renew each run as one unit of work spanning the
//! item state machine, the loan ledger and the hold queue, with the audit
//! event in the same transaction. Lock order is item -> loan everywhere;
//! the checkin reassignment path locks the queue head non-blocking (see
//! [`crate::services::holds::assign_next_or_release`]).

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::{
        hold::Hold,
        item::{Item, ItemStatus},
        loan::{Loan, LoanStatus},
        policy::CirculationPolicy,
        user::User,
    },
    pagination::{Cursor, Page},
    repository::{LockMode, Repository},
    services::{holds, require_active_borrower, require_active_staff},
};

/// Result of a checkin: the closed loan, the item's new status, and the
/// hold the item was assigned to (if the queue was non-empty)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckinOutcome {
    pub loan: Loan,
    pub item_status: ItemStatus,
    pub assigned_hold: Option<Hold>,
}

/// Result of a renewal with the previous due date for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RenewOutcome {
    pub loan: Loan,
    pub previous_due_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CirculationService {
    repository: Repository,
}

impl CirculationService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Check an available item out to a borrower
    pub async fn checkout(
        &self,
        org_id: Uuid,
        actor_id: Uuid,
        borrower_external_id: &str,
        item_barcode: &str,
    ) -> AppResult<Loan> {
        let repo = &self.repository;
        let now = Utc::now();
        let mut tx = repo.begin().await?;

        let actor = repo.users.get_by_id(&mut tx, org_id, actor_id).await?;
        require_active_staff(&actor)?;

        let borrower = repo
            .users
            .get_by_external_id(&mut tx, org_id, borrower_external_id)
            .await?;
        require_active_borrower(&borrower)?;

        let item = repo
            .items
            .lock_by_barcode(&mut tx, org_id, item_barcode)
            .await?;
        if item.status != ItemStatus::Available {
            return Err(AppError::conflict_with(
                ErrorCode::ItemNotAvailable,
                format!("Item {} is {}", item.barcode, item.status),
                serde_json::json!({ "item_id": item.id, "status": item.status.as_code() }),
            ));
        }

        let policy = repo
            .policies
            .resolve_active(&mut tx, org_id, borrower.role)
            .await?;
        check_overdue_block(repo, &mut tx, &borrower, &policy, now).await?;

        let open_loans = repo.loans.count_open_for_user(&mut tx, borrower.id).await?;
        if open_loans >= policy.max_loans as i64 {
            return Err(AppError::conflict_with(
                ErrorCode::LoanLimitReached,
                format!("Loan limit reached ({}/{})", open_loans, policy.max_loans),
                serde_json::json!({ "open_loans": open_loans, "max_loans": policy.max_loans }),
            ));
        }

        let due_at = now + Duration::days(policy.loan_days as i64);
        let loan = repo
            .loans
            .insert(&mut tx, org_id, item.id, borrower.id, now, due_at)
            .await?;
        repo.items
            .set_status(&mut tx, &item, ItemStatus::CheckedOut)
            .await?;

        repo.audit
            .record(
                &mut tx,
                org_id,
                Some(actor.id),
                "loan.checkout",
                "loan",
                &loan.id.to_string(),
                serde_json::json!({
                    "item_id": item.id,
                    "barcode": item.barcode,
                    "user_id": borrower.id,
                    "due_at": due_at,
                }),
            )
            .await?;

        tx.commit().await?;
        Ok(loan)
    }

    /// Return a checked-out item; the copy goes to the hold queue head if
    /// one is waiting, back to the shelf otherwise
    pub async fn checkin(
        &self,
        org_id: Uuid,
        actor_id: Uuid,
        item_barcode: &str,
    ) -> AppResult<CheckinOutcome> {
        let repo = &self.repository;
        let now = Utc::now();
        let mut tx = repo.begin().await?;

        let actor = repo.users.get_by_id(&mut tx, org_id, actor_id).await?;
        require_active_staff(&actor)?;

        let item = repo
            .items
            .lock_by_barcode(&mut tx, org_id, item_barcode)
            .await?;
        let loan = match repo
            .loans
            .lock_open_for_item(&mut tx, item.id, LockMode::Wait)
            .await?
        {
            Some(loan) => loan,
            None if item.status == ItemStatus::CheckedOut => {
                return Err(AppError::conflict_with(
                    ErrorCode::DataInconsistent,
                    format!("Item {} is checked_out but has no open loan", item.barcode),
                    serde_json::json!({ "item_id": item.id }),
                ));
            }
            None => {
                return Err(AppError::NotFound(format!(
                    "No open loan for item {}",
                    item.barcode
                )));
            }
        };

        repo.loans.close(&mut tx, loan.id, now).await?;
        let mut closed = loan.clone();
        closed.returned_at = Some(now);
        closed.status = LoanStatus::Closed;

        // Queue head is locked non-blocking here: we already hold the item
        // lock, the reverse of the hold -> item order CreateHold uses.
        let next = holds::assign_next_or_release(repo, &mut tx, org_id, &item, now).await?;
        let (item_status, assigned_hold) = match next {
            holds::NextAssignment::Transferred(hold) => (ItemStatus::OnHold, Some(hold)),
            holds::NextAssignment::Released => (ItemStatus::Available, None),
        };

        repo.audit
            .record(
                &mut tx,
                org_id,
                Some(actor.id),
                "loan.checkin",
                "loan",
                &loan.id.to_string(),
                serde_json::json!({
                    "item_id": item.id,
                    "barcode": item.barcode,
                    "item_status": item_status.as_code(),
                    "assigned_hold_id": assigned_hold.as_ref().map(|h| h.id),
                }),
            )
            .await?;

        tx.commit().await?;
        Ok(CheckinOutcome {
            loan: closed,
            item_status,
            assigned_hold,
        })
    }

    /// Renew an open loan.
    ///
    /// The item is locked before the loan; checkin does the same, so a
    /// concurrent renew/checkin on one item serializes instead of
    /// deadlocking.
    pub async fn renew(
        &self,
        org_id: Uuid,
        actor_id: Uuid,
        loan_id: Uuid,
    ) -> AppResult<RenewOutcome> {
        let repo = &self.repository;
        let now = Utc::now();
        let mut tx = repo.begin().await?;

        let actor = repo.users.get_by_id(&mut tx, org_id, actor_id).await?;
        if !actor.is_active() {
            return Err(AppError::Inactive(format!(
                "User {} is inactive",
                actor.external_id
            )));
        }

        // Plain read to learn the item id, then lock item -> loan.
        let loan_ref = repo.loans.get_by_id(org_id, loan_id).await?;
        let item = repo.items.lock_by_id(&mut tx, loan_ref.item_id).await?;
        let loan = repo.loans.lock_by_id(&mut tx, loan_id).await?;

        if item.status != ItemStatus::CheckedOut {
            return Err(AppError::conflict_with(
                ErrorCode::RenewNotAllowed,
                format!("Item {} is {}, not checked_out", item.barcode, item.status),
                serde_json::json!({ "item_id": item.id, "status": item.status.as_code() }),
            ));
        }
        if loan.returned_at.is_some() {
            return Err(AppError::conflict(
                ErrorCode::LoanNotOpen,
                "Loan is already closed",
            ));
        }

        // Staff renew any loan; borrowers only their own.
        if !actor.role.is_staff() && actor.id != loan.user_id {
            return Err(AppError::Forbidden(
                "Only staff may renew another borrower's loan".to_string(),
            ));
        }

        let borrower = repo.users.get_by_id(&mut tx, org_id, loan.user_id).await?;
        let policy = repo
            .policies
            .resolve_active(&mut tx, org_id, borrower.role)
            .await?;

        if loan.renewed_count >= policy.max_renewals {
            return Err(AppError::conflict_with(
                ErrorCode::RenewLimitReached,
                format!(
                    "Renewal limit reached ({}/{})",
                    loan.renewed_count, policy.max_renewals
                ),
                serde_json::json!({
                    "renewed_count": loan.renewed_count,
                    "max_renewals": policy.max_renewals,
                }),
            ));
        }
        check_overdue_block(repo, &mut tx, &borrower, &policy, now).await?;

        // Renewal must not starve waiting borrowers.
        if repo
            .holds
            .queued_exists_for_title(&mut tx, org_id, item.bibliographic_id)
            .await?
        {
            return Err(AppError::conflict_with(
                ErrorCode::RenewBlockedByQueue,
                "A hold is queued for this title",
                serde_json::json!({ "bibliographic_id": item.bibliographic_id }),
            ));
        }

        let new_due_at = extended_due(now, loan.due_at, policy.loan_days);
        let new_count = loan.renewed_count + 1;
        repo.loans.renew(&mut tx, loan.id, new_due_at, new_count).await?;

        repo.audit
            .record(
                &mut tx,
                org_id,
                Some(actor.id),
                "loan.renew",
                "loan",
                &loan.id.to_string(),
                serde_json::json!({
                    "item_id": item.id,
                    "old_due_at": loan.due_at,
                    "new_due_at": new_due_at,
                    "renewed_count": new_count,
                }),
            )
            .await?;

        tx.commit().await?;

        let mut renewed = loan.clone();
        renewed.due_at = new_due_at;
        renewed.renewed_count = new_count;
        Ok(RenewOutcome {
            loan: renewed,
            previous_due_at: loan.due_at,
        })
    }

    /// Staff action: move an item to lost/repair/withdrawn or recover it.
    ///
    /// Marking a checked-out item lost leaves its open loan untouched; the
    /// mismatch surfaces as DATA_INCONSISTENT on later operations rather
    /// than being auto-repaired.
    pub async fn set_item_status(
        &self,
        org_id: Uuid,
        actor_id: Uuid,
        item_barcode: &str,
        to: ItemStatus,
    ) -> AppResult<Item> {
        let repo = &self.repository;
        let mut tx = repo.begin().await?;

        let actor = repo.users.get_by_id(&mut tx, org_id, actor_id).await?;
        require_active_staff(&actor)?;

        if matches!(to, ItemStatus::CheckedOut | ItemStatus::OnHold) {
            return Err(AppError::Validation(format!(
                "Status {} is driven by circulation, not set directly",
                to.as_code()
            )));
        }

        let item = repo
            .items
            .lock_by_barcode(&mut tx, org_id, item_barcode)
            .await?;
        let updated = repo.items.set_status(&mut tx, &item, to).await?;

        repo.audit
            .record(
                &mut tx,
                org_id,
                Some(actor.id),
                "item.status",
                "item",
                &item.id.to_string(),
                serde_json::json!({
                    "barcode": item.barcode,
                    "from": item.status.as_code(),
                    "to": to.as_code(),
                }),
            )
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// List loans, newest first
    pub async fn list_loans(
        &self,
        org_id: Uuid,
        status: Option<crate::models::loan::LoanStatus>,
        user_id: Option<Uuid>,
        cursor: Option<String>,
        limit: i64,
    ) -> AppResult<Page<Loan>> {
        let cursor = cursor.as_deref().map(Cursor::decode).transpose()?;
        let limit = limit.clamp(1, 200);
        self.repository
            .loans
            .list(org_id, status, user_id, cursor, limit)
            .await
    }
}

/// New due date for a renewal: extends from whichever is later, the current
/// due date or now, so a renewal never shortens the loan
fn extended_due(
    now: DateTime<Utc>,
    current_due: DateTime<Utc>,
    loan_days: i32,
) -> DateTime<Utc> {
    let base = if current_due > now { current_due } else { now };
    base + Duration::days(loan_days as i64)
}

/// Fail when the borrower holds a loan overdue past the policy threshold
pub(crate) async fn check_overdue_block(
    repo: &Repository,
    conn: &mut sqlx::PgConnection,
    borrower: &User,
    policy: &CirculationPolicy,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if repo
        .loans
        .has_blocking_overdue(conn, borrower.id, policy.overdue_block_days, now)
        .await?
    {
        return Err(AppError::conflict_with(
            ErrorCode::BorrowerBlocked,
            format!(
                "Borrower {} has a loan overdue {} days or more",
                borrower.external_id, policy.overdue_block_days
            ),
            serde_json::json!({
                "user_id": borrower.id,
                "overdue_block_days": policy.overdue_block_days,
            }),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renewal_extends_from_due_date_when_not_yet_due() {
        let now = Utc::now();
        let due = now + Duration::days(3);
        let new_due = extended_due(now, due, 14);
        assert_eq!(new_due, due + Duration::days(14));
    }

    #[test]
    fn renewal_extends_from_now_when_overdue() {
        let now = Utc::now();
        let due = now - Duration::days(5);
        let new_due = extended_due(now, due, 14);
        assert_eq!(new_due, now + Duration::days(14));
    }

    #[test]
    fn renewal_never_shortens_the_loan() {
        let now = Utc::now();
        for offset in [-30i64, -1, 0, 1, 30] {
            let due = now + Duration::days(offset);
            assert!(extended_due(now, due, 7) >= due);
        }
    }
}
