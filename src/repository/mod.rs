//! Repository layer for database operations
//!
//! Multi-entity operations run inside a [`UnitOfWork`] started by the owning
//! service; every mutating repository method takes `&mut PgConnection` so the
//! transaction has to be threaded through explicitly. Plain lookups and
//! listings go straight to the pool.

pub mod audit;
pub mod bibs;
pub mod holds;
pub mod items;
pub mod jobs;
pub mod loans;
pub mod locations;
pub mod policies;
pub mod users;

use sqlx::{Pool, Postgres, Transaction};

use crate::error::AppResult;

/// Transaction wrapper all multi-entity circulation operations run in
pub type UnitOfWork<'c> = Transaction<'c, Postgres>;

/// Row lock acquisition mode.
///
/// `Wait` blocks until the row lock is granted; `SkipLocked` skips rows
/// already locked by an in-flight operation instead of waiting. The fixed
/// lock-order invariants (item -> loan; hold queue head -> item) rely on
/// `SkipLocked` for the one reversal (checkin/cancel reassignment locking
/// the queue head while already holding the item).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Wait,
    SkipLocked,
}

impl LockMode {
    /// SQL suffix for the row-locking clause
    pub fn row_clause(&self) -> &'static str {
        match self {
            LockMode::Wait => "FOR UPDATE",
            LockMode::SkipLocked => "FOR UPDATE SKIP LOCKED",
        }
    }
}

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub items: items::ItemsRepository,
    pub loans: loans::LoansRepository,
    pub holds: holds::HoldsRepository,
    pub policies: policies::PoliciesRepository,
    pub users: users::UsersRepository,
    pub locations: locations::LocationsRepository,
    pub bibs: bibs::BibsRepository,
    pub audit: audit::AuditRepository,
    pub jobs: jobs::JobsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool: pool.clone(),
            items: items::ItemsRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            holds: holds::HoldsRepository::new(pool.clone()),
            policies: policies::PoliciesRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            locations: locations::LocationsRepository::new(pool.clone()),
            bibs: bibs::BibsRepository::new(pool.clone()),
            audit: audit::AuditRepository::new(pool.clone()),
            jobs: jobs::JobsRepository::new(pool.clone()),
        }
    }

    /// Begin a unit of work; commit it explicitly, drop to roll back
    pub async fn begin(&self) -> AppResult<UnitOfWork<'static>> {
        Ok(self.pool.begin().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_mode_clauses() {
        assert_eq!(LockMode::Wait.row_clause(), "FOR UPDATE");
        assert_eq!(LockMode::SkipLocked.row_clause(), "FOR UPDATE SKIP LOCKED");
    }
}
