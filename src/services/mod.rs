//! Business logic services

pub mod circulation;
pub mod holds;
pub mod jobs;
pub mod worker;

use crate::{
    error::{AppError, AppResult},
    models::user::User,
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub circulation: circulation::CirculationService,
    pub holds: holds::HoldsService,
    pub jobs: jobs::JobsService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository) -> Self {
        let holds = holds::HoldsService::new(repository.clone());
        Self {
            circulation: circulation::CirculationService::new(repository.clone()),
            jobs: jobs::JobsService::new(repository.clone(), holds.clone()),
            holds,
            repository,
        }
    }
}

/// Require an active staff member (circulation desk operations)
pub(crate) fn require_active_staff(user: &User) -> AppResult<()> {
    if !user.role.is_staff() {
        return Err(AppError::Forbidden(format!(
            "User {} is not staff",
            user.external_id
        )));
    }
    if !user.is_active() {
        return Err(AppError::Inactive(format!(
            "User {} is inactive",
            user.external_id
        )));
    }
    Ok(())
}

/// Require an active borrower (loan/hold subject)
pub(crate) fn require_active_borrower(user: &User) -> AppResult<()> {
    if !user.role.is_borrower() {
        return Err(AppError::Forbidden(format!(
            "User {} is not a borrowing role",
            user.external_id
        )));
    }
    if !user.is_active() {
        return Err(AppError::Inactive(format!(
            "User {} is inactive",
            user.external_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{UserRole, UserStatus};
    use uuid::Uuid;

    fn user(role: UserRole, status: UserStatus) -> User {
        User {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            external_id: "X0001".to_string(),
            name: "Test".to_string(),
            role,
            org_unit: None,
            status,
        }
    }

    #[test]
    fn staff_guard() {
        assert!(require_active_staff(&user(UserRole::Librarian, UserStatus::Active)).is_ok());
        assert!(matches!(
            require_active_staff(&user(UserRole::Student, UserStatus::Active)),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            require_active_staff(&user(UserRole::Admin, UserStatus::Inactive)),
            Err(AppError::Inactive(_))
        ));
    }

    #[test]
    fn borrower_guard() {
        assert!(require_active_borrower(&user(UserRole::Student, UserStatus::Active)).is_ok());
        assert!(matches!(
            require_active_borrower(&user(UserRole::Admin, UserStatus::Active)),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            require_active_borrower(&user(UserRole::Teacher, UserStatus::Inactive)),
            Err(AppError::Inactive(_))
        ));
    }
}
