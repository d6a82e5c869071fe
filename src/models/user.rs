//! User model — the slice of the directory the engine consumes
//!
//! User management itself lives outside the engine; circulation only needs
//! identity, role class, and active/inactive status.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Librarian,
    Teacher,
    Student,
}

impl UserRole {
    pub fn as_code(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Librarian => "librarian",
            UserRole::Teacher => "teacher",
            UserRole::Student => "student",
        }
    }

    pub fn parse(code: &str) -> AppResult<Self> {
        match code {
            "admin" => Ok(UserRole::Admin),
            "librarian" => Ok(UserRole::Librarian),
            "teacher" => Ok(UserRole::Teacher),
            "student" => Ok(UserRole::Student),
            other => Err(AppError::Validation(format!("Unknown role '{}'", other))),
        }
    }

    /// Staff may operate the circulation desk
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Librarian)
    }

    /// Borrowing roles are subject to circulation policies
    pub fn is_borrower(&self) -> bool {
        matches!(self, UserRole::Teacher | UserRole::Student)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_code(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }

    pub fn parse(code: &str) -> AppResult<Self> {
        match code {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            other => Err(AppError::Validation(format!(
                "Unknown user status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub external_id: String,
    pub name: String,
    pub role: UserRole,
    pub org_unit: Option<String>,
    pub status: UserStatus,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_classes_are_disjoint() {
        for role in [
            UserRole::Admin,
            UserRole::Librarian,
            UserRole::Teacher,
            UserRole::Student,
        ] {
            assert_ne!(role.is_staff(), role.is_borrower());
        }
    }
}
