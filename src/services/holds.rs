//! Hold queue manager
//!
//! Maintains the FIFO queue of holds per title, assigns available copies to
//! the queue head, and handles cancellation/expiry reassignment. Lock order
//! is hold (or queue head) -> item, except the reassignment path entered
//! from checkin/cancel, which already holds the item lock and therefore
//! takes the queue head non-blocking.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::{
        hold::{Hold, HoldStatus},
        item::{Item, ItemStatus},
        job::ExpireReadySummary,
        loan::Loan,
        location::LocationStatus,
    },
    pagination::{Cursor, Page},
    repository::{LockMode, Repository},
    services::{circulation::check_overdue_block, require_active_borrower, require_active_staff},
};

/// Where an item went after a ready hold released it
#[derive(Debug, Clone)]
pub enum NextAssignment {
    /// Assigned to the next queued hold (now ready)
    Transferred(Hold),
    /// No queue left; the copy is back on the shelf
    Released,
}

/// Expiry sweep mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExpireMode {
    Preview,
    Apply,
}

/// Result of fulfilling a ready hold: the closed hold plus the loan it
/// turned into
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FulfillOutcome {
    pub hold: Hold,
    pub loan: Loan,
}

#[derive(Clone)]
pub struct HoldsService {
    repository: Repository,
}

impl HoldsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Place a hold on a title for a borrower.
    ///
    /// If a copy is available the queue head is promoted immediately; FIFO
    /// means that is not necessarily the hold just placed.
    pub async fn create_hold(
        &self,
        org_id: Uuid,
        borrower_external_id: &str,
        bibliographic_id: Uuid,
        pickup_location_id: Uuid,
        actor_id: Option<Uuid>,
    ) -> AppResult<Hold> {
        let repo = &self.repository;
        let now = Utc::now();
        let mut tx = repo.begin().await?;

        let actor = match actor_id {
            Some(id) => {
                let actor = repo.users.get_by_id(&mut tx, org_id, id).await?;
                require_active_staff(&actor)?;
                Some(actor)
            }
            None => None,
        };

        let borrower = repo
            .users
            .get_by_external_id(&mut tx, org_id, borrower_external_id)
            .await?;
        require_active_borrower(&borrower)?;

        if !repo
            .bibs
            .title_exists(&mut tx, org_id, bibliographic_id)
            .await?
        {
            return Err(AppError::NotFound(format!(
                "Title {} not found",
                bibliographic_id
            )));
        }

        let location = repo
            .locations
            .get_by_id(&mut tx, org_id, pickup_location_id)
            .await?;
        if location.status != LocationStatus::Active {
            return Err(AppError::Inactive(format!(
                "Location {} is inactive",
                location.code
            )));
        }

        let policy = repo
            .policies
            .resolve_active(&mut tx, org_id, borrower.role)
            .await?;
        check_overdue_block(repo, &mut tx, &borrower, &policy, now).await?;

        if repo
            .holds
            .active_for_user_title(&mut tx, org_id, borrower.id, bibliographic_id)
            .await?
            .is_some()
        {
            return Err(AppError::conflict_with(
                ErrorCode::DuplicateHold,
                "Borrower already has an active hold on this title",
                serde_json::json!({ "user_id": borrower.id, "bibliographic_id": bibliographic_id }),
            ));
        }

        let active_holds = repo
            .holds
            .count_active_for_user(&mut tx, org_id, borrower.id)
            .await?;
        if active_holds >= policy.max_holds as i64 {
            return Err(AppError::conflict_with(
                ErrorCode::HoldLimitReached,
                format!("Hold limit reached ({}/{})", active_holds, policy.max_holds),
                serde_json::json!({ "active_holds": active_holds, "max_holds": policy.max_holds }),
            ));
        }

        let hold = repo
            .holds
            .insert_queued(
                &mut tx,
                org_id,
                bibliographic_id,
                borrower.id,
                pickup_location_id,
                now,
            )
            .await?;

        let actor_for_audit = actor.map(|a| a.id).unwrap_or(borrower.id);
        repo.audit
            .record(
                &mut tx,
                org_id,
                Some(actor_for_audit),
                "hold.place",
                "hold",
                &hold.id.to_string(),
                serde_json::json!({
                    "user_id": borrower.id,
                    "bibliographic_id": bibliographic_id,
                    "pickup_location_id": pickup_location_id,
                }),
            )
            .await?;

        // Immediate assignment: queue head first (FOR UPDATE, one row),
        // then one available copy non-blocking, so concurrent placements
        // against different copies don't serialize.
        let head = repo
            .holds
            .lock_queue_head(&mut tx, org_id, bibliographic_id, LockMode::Wait)
            .await?;
        if let Some(head) = head {
            let available = repo
                .items
                .lock_available_for_title(&mut tx, org_id, bibliographic_id, LockMode::SkipLocked)
                .await?;
            if let Some(item) = available {
                let promoted =
                    promote_to_ready(repo, &mut tx, org_id, &head, &item, now, actor_for_audit)
                        .await?;
                tx.commit().await?;
                // Return the placed hold in its current state.
                if promoted.id == hold.id {
                    return Ok(promoted);
                }
                return self.repository.holds.get_by_id(org_id, hold.id).await;
            }
        }

        tx.commit().await?;
        Ok(hold)
    }

    /// Cancel a queued or ready hold.
    ///
    /// A ready hold gives its copy back to the queue: next queued hold if
    /// any, shelf otherwise.
    pub async fn cancel_hold(
        &self,
        org_id: Uuid,
        hold_id: Uuid,
        actor_id: Option<Uuid>,
    ) -> AppResult<Hold> {
        let repo = &self.repository;
        let now = Utc::now();
        let mut tx = repo.begin().await?;

        let hold = repo.holds.lock_by_id(&mut tx, org_id, hold_id).await?;

        let actor_for_audit = match actor_id {
            Some(id) => {
                let actor = repo.users.get_by_id(&mut tx, org_id, id).await?;
                if !actor.role.is_staff() && actor.id != hold.user_id {
                    return Err(AppError::Forbidden(
                        "Only staff may cancel another borrower's hold".to_string(),
                    ));
                }
                if !actor.is_active() {
                    return Err(AppError::Inactive(format!(
                        "User {} is inactive",
                        actor.external_id
                    )));
                }
                actor.id
            }
            None => hold.user_id,
        };

        if !hold.status.is_active() {
            return Err(AppError::conflict_with(
                ErrorCode::HoldNotActive,
                format!("Hold is {}", hold.status),
                serde_json::json!({ "status": hold.status.as_code() }),
            ));
        }

        repo.holds.mark_cancelled(&mut tx, hold.id, now).await?;

        let mut transfer_target: Option<Uuid> = None;
        let mut item_action = "none";
        if hold.status == HoldStatus::Ready {
            if let Some(item_id) = hold.assigned_item_id {
                let item = repo.items.lock_by_id(&mut tx, item_id).await?;
                if item.status == ItemStatus::OnHold {
                    match assign_next_or_release(repo, &mut tx, org_id, &item, now).await? {
                        NextAssignment::Transferred(next) => {
                            transfer_target = Some(next.id);
                            item_action = "transferred";
                        }
                        NextAssignment::Released => item_action = "released",
                    }
                } else {
                    item_action = "skipped";
                }
            }
        }

        repo.audit
            .record(
                &mut tx,
                org_id,
                Some(actor_for_audit),
                "hold.cancel",
                "hold",
                &hold.id.to_string(),
                serde_json::json!({
                    "previous_status": hold.status.as_code(),
                    "item_action": item_action,
                    "transferred_to": transfer_target,
                }),
            )
            .await?;

        tx.commit().await?;

        let mut cancelled = hold.clone();
        cancelled.status = HoldStatus::Cancelled;
        cancelled.assigned_item_id = None;
        cancelled.cancelled_at = Some(now);
        Ok(cancelled)
    }

    /// Hand the assigned copy to the borrower: the ready hold becomes a
    /// loan in one transaction
    pub async fn fulfill_hold(
        &self,
        org_id: Uuid,
        hold_id: Uuid,
        actor_id: Uuid,
    ) -> AppResult<FulfillOutcome> {
        let repo = &self.repository;
        let now = Utc::now();
        let mut tx = repo.begin().await?;

        let actor = repo.users.get_by_id(&mut tx, org_id, actor_id).await?;
        require_active_staff(&actor)?;

        let hold = repo.holds.lock_by_id(&mut tx, org_id, hold_id).await?;
        if hold.status != HoldStatus::Ready {
            return Err(AppError::conflict_with(
                ErrorCode::HoldNotActive,
                format!("Hold is {}, not ready", hold.status),
                serde_json::json!({ "status": hold.status.as_code() }),
            ));
        }
        let item_id = hold.assigned_item_id.ok_or_else(|| {
            AppError::conflict(
                ErrorCode::DataInconsistent,
                "Ready hold has no assigned item",
            )
        })?;
        match hold.ready_until {
            Some(deadline) if deadline >= now => {}
            _ => {
                return Err(AppError::conflict_with(
                    ErrorCode::HoldExpired,
                    "Pickup deadline has passed",
                    serde_json::json!({ "ready_until": hold.ready_until }),
                ));
            }
        }

        let item = repo.items.lock_by_id(&mut tx, item_id).await?;
        if item.status != ItemStatus::OnHold || item.bibliographic_id != hold.bibliographic_id {
            return Err(AppError::conflict_with(
                ErrorCode::DataInconsistent,
                format!("Assigned item {} does not match the hold", item.barcode),
                serde_json::json!({
                    "item_id": item.id,
                    "item_status": item.status.as_code(),
                    "item_bibliographic_id": item.bibliographic_id,
                    "hold_bibliographic_id": hold.bibliographic_id,
                }),
            ));
        }

        let borrower = repo.users.get_by_id(&mut tx, org_id, hold.user_id).await?;
        require_active_borrower(&borrower)?;
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
        repo.holds.mark_fulfilled(&mut tx, hold.id, now).await?;

        // One combined trail for the pickup and the loan it produced.
        repo.audit
            .record(
                &mut tx,
                org_id,
                Some(actor.id),
                "hold.fulfill",
                "hold",
                &hold.id.to_string(),
                serde_json::json!({
                    "user_id": borrower.id,
                    "item_id": item.id,
                    "loan_id": loan.id,
                    "due_at": due_at,
                }),
            )
            .await?;

        tx.commit().await?;

        let mut fulfilled = hold.clone();
        fulfilled.status = HoldStatus::Fulfilled;
        fulfilled.assigned_item_id = None;
        fulfilled.fulfilled_at = Some(now);
        Ok(FulfillOutcome {
            hold: fulfilled,
            loan,
        })
    }

    /// Expire ready holds whose pickup window lapsed.
    ///
    /// Each hold commits in its own transaction together with its audit
    /// event, so the sweep is safe to stop and resume at any point.
    /// Candidate rows locked by a concurrent fulfill/cancel are skipped,
    /// never waited on.
    pub async fn expire_ready(
        &self,
        org_id: Uuid,
        actor_id: Uuid,
        as_of: DateTime<Utc>,
        limit: i64,
        mode: ExpireMode,
    ) -> AppResult<ExpireReadySummary> {
        let repo = &self.repository;
        let limit = limit.clamp(1, 1000);
        let now = Utc::now();

        let candidates = repo
            .holds
            .expired_ready_candidates(org_id, as_of, limit)
            .await?;
        let mut summary = ExpireReadySummary {
            candidates_total: candidates.len() as i64,
            ..Default::default()
        };
        if mode == ExpireMode::Preview {
            return Ok(summary);
        }

        for candidate in candidates {
            let mut tx = repo.begin().await?;
            let hold = match repo
                .holds
                .lock_expiry_candidate(&mut tx, candidate.id, as_of)
                .await?
            {
                Some(hold) => hold,
                None => {
                    // Lost to a concurrent fulfill/cancel, or already expired.
                    summary.skipped += 1;
                    continue;
                }
            };

            repo.holds.mark_expired(&mut tx, hold.id).await?;
            summary.processed += 1;

            let mut item_action = "none";
            let mut transfer_target: Option<Uuid> = None;
            let mut item_before: Option<&'static str> = None;
            let mut item_after: Option<&'static str> = None;

            if let Some(item_id) = hold.assigned_item_id {
                let item = repo.items.lock_by_id(&mut tx, item_id).await?;
                item_before = Some(item.status.as_code());
                match item.status {
                    ItemStatus::OnHold | ItemStatus::Available => {
                        match assign_next_or_release(repo, &mut tx, org_id, &item, now).await? {
                            NextAssignment::Transferred(next) => {
                                summary.transferred += 1;
                                transfer_target = Some(next.id);
                                item_action = "transferred";
                                item_after = Some(ItemStatus::OnHold.as_code());
                            }
                            NextAssignment::Released => {
                                summary.released += 1;
                                item_action = "released";
                                item_after = Some(ItemStatus::Available.as_code());
                            }
                        }
                    }
                    other => {
                        // Item drifted into a state the sweep must not touch;
                        // the hold still expires, the mismatch is recorded.
                        tracing::warn!(
                            hold_id = %hold.id,
                            item_id = %item.id,
                            status = other.as_code(),
                            "expired hold left its item untouched"
                        );
                        summary.skipped += 1;
                        item_action = "skipped";
                        item_after = Some(other.as_code());
                    }
                }
            }

            repo.audit
                .record(
                    &mut tx,
                    org_id,
                    Some(actor_id),
                    "hold.expire",
                    "hold",
                    &hold.id.to_string(),
                    serde_json::json!({
                        "ready_until": hold.ready_until,
                        "item_id": hold.assigned_item_id,
                        "item_status_before": item_before,
                        "item_status_after": item_after,
                        "item_action": item_action,
                        "transferred_to": transfer_target,
                    }),
                )
                .await?;

            tx.commit().await?;
        }

        Ok(summary)
    }

    /// Staff-triggered sweep from the maintenance endpoint; the worker path
    /// validates the actor at enqueue time instead
    pub async fn expire_ready_manual(
        &self,
        org_id: Uuid,
        actor_id: Uuid,
        as_of: DateTime<Utc>,
        limit: i64,
        mode: ExpireMode,
    ) -> AppResult<ExpireReadySummary> {
        let repo = &self.repository;
        let mut conn = repo.pool.acquire().await?;
        let actor = repo.users.get_by_id(&mut conn, org_id, actor_id).await?;
        require_active_staff(&actor)?;
        drop(conn);

        self.expire_ready(org_id, actor_id, as_of, limit, mode).await
    }

    /// List holds, newest first
    pub async fn list_holds(
        &self,
        org_id: Uuid,
        status: Option<HoldStatus>,
        user_id: Option<Uuid>,
        bibliographic_id: Option<Uuid>,
        cursor: Option<String>,
        limit: i64,
    ) -> AppResult<Page<Hold>> {
        let cursor = cursor.as_deref().map(Cursor::decode).transpose()?;
        let limit = limit.clamp(1, 200);
        self.repository
            .holds
            .list(org_id, status, user_id, bibliographic_id, cursor, limit)
            .await
    }

    /// Get a hold by id
    pub async fn get_hold(&self, org_id: Uuid, hold_id: Uuid) -> AppResult<Hold> {
        self.repository.holds.get_by_id(org_id, hold_id).await
    }
}

/// Promote a locked queue head to ready against a locked item.
///
/// Caller holds both row locks; the pickup window comes from the head
/// borrower's own policy.
async fn promote_head(
    repo: &Repository,
    conn: &mut PgConnection,
    org_id: Uuid,
    head: &Hold,
    item: &Item,
    now: DateTime<Utc>,
) -> AppResult<Hold> {
    let borrower = repo.users.get_by_id(conn, org_id, head.user_id).await?;
    let policy = repo
        .policies
        .resolve_active(conn, org_id, borrower.role)
        .await?;
    let ready_until = now + Duration::days(policy.hold_pickup_days as i64);

    repo.holds
        .mark_ready(conn, head.id, item.id, now, ready_until)
        .await?;
    repo.items.set_status(conn, item, ItemStatus::OnHold).await?;

    let mut promoted = head.clone();
    promoted.status = HoldStatus::Ready;
    promoted.assigned_item_id = Some(item.id);
    promoted.ready_at = Some(now);
    promoted.ready_until = Some(ready_until);
    Ok(promoted)
}

/// Promote with its own audit event (immediate assignment on placement)
async fn promote_to_ready(
    repo: &Repository,
    conn: &mut PgConnection,
    org_id: Uuid,
    head: &Hold,
    item: &Item,
    now: DateTime<Utc>,
    actor_for_audit: Uuid,
) -> AppResult<Hold> {
    let promoted = promote_head(repo, conn, org_id, head, item, now).await?;

    repo.audit
        .record(
            conn,
            org_id,
            Some(actor_for_audit),
            "hold.ready",
            "hold",
            &promoted.id.to_string(),
            serde_json::json!({
                "item_id": item.id,
                "ready_until": promoted.ready_until,
            }),
        )
        .await?;

    Ok(promoted)
}

/// Hand a freed copy to the next queued hold, or release it to the shelf.
///
/// Entered with the item lock already held (checkin, cancel, expiry), so
/// the queue head is taken non-blocking to avoid deadlocking against
/// CreateHold's hold -> item order.
pub(crate) async fn assign_next_or_release(
    repo: &Repository,
    conn: &mut PgConnection,
    org_id: Uuid,
    item: &Item,
    now: DateTime<Utc>,
) -> AppResult<NextAssignment> {
    let head = repo
        .holds
        .lock_queue_head(conn, org_id, item.bibliographic_id, LockMode::SkipLocked)
        .await?;
    match head {
        Some(head) => {
            let promoted = promote_head(repo, conn, org_id, &head, item, now).await?;
            Ok(NextAssignment::Transferred(promoted))
        }
        None => {
            if item.status != ItemStatus::Available {
                repo.items
                    .set_status(conn, item, ItemStatus::Available)
                    .await?;
            }
            Ok(NextAssignment::Released)
        }
    }
}
