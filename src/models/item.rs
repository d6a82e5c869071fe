//! Item (physical copy) model and status state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Status of a physical copy.
///
/// Transitions are validated centrally by [`ItemStatus::can_transition`];
/// repositories refuse to persist anything the table does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Available,
    CheckedOut,
    OnHold,
    Lost,
    Withdrawn,
    Repair,
}

impl ItemStatus {
    /// Database/API code for this status
    pub fn as_code(&self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::CheckedOut => "checked_out",
            ItemStatus::OnHold => "on_hold",
            ItemStatus::Lost => "lost",
            ItemStatus::Withdrawn => "withdrawn",
            ItemStatus::Repair => "repair",
        }
    }

    pub fn parse(code: &str) -> AppResult<Self> {
        match code {
            "available" => Ok(ItemStatus::Available),
            "checked_out" => Ok(ItemStatus::CheckedOut),
            "on_hold" => Ok(ItemStatus::OnHold),
            "lost" => Ok(ItemStatus::Lost),
            "withdrawn" => Ok(ItemStatus::Withdrawn),
            "repair" => Ok(ItemStatus::Repair),
            other => Err(AppError::Validation(format!(
                "Unknown item status '{}'",
                other
            ))),
        }
    }

    /// The closed transition table for physical copies.
    ///
    /// on_hold -> on_hold covers expiry reassignment to the next queued
    /// borrower; lost/repair -> available are the staff recovery actions.
    pub fn can_transition(self, to: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, to),
            (Available, CheckedOut)
                | (Available, OnHold)
                | (CheckedOut, Available)
                | (CheckedOut, OnHold)
                | (OnHold, CheckedOut)
                | (OnHold, Available)
                | (OnHold, OnHold)
                | (Available, Lost)
                | (CheckedOut, Lost)
                | (Available, Repair)
                | (Available, Withdrawn)
                | (Repair, Withdrawn)
                | (Lost, Withdrawn)
                | (Lost, Available)
                | (Repair, Available)
        )
    }

    /// Validate a transition, failing with the attempted from/to pair
    pub fn validate_transition(self, to: ItemStatus) -> AppResult<()> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(AppError::InvalidTransition {
                entity: "item",
                from: self.as_code().to_string(),
                to: to.as_code().to_string(),
            })
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

/// Physical copy of a bibliographic record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Item {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub bibliographic_id: Uuid,
    pub barcode: String,
    pub call_number: Option<String>,
    pub location_id: Option<Uuid>,
    pub status: ItemStatus,
    pub acquired_at: Option<DateTime<Utc>>,
    pub last_inventory_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ItemStatus::*;

    #[test]
    fn checkout_and_hold_assignment_from_available() {
        assert!(Available.can_transition(CheckedOut));
        assert!(Available.can_transition(OnHold));
    }

    #[test]
    fn checkin_paths() {
        assert!(CheckedOut.can_transition(Available));
        assert!(CheckedOut.can_transition(OnHold));
    }

    #[test]
    fn hold_lifecycle_paths() {
        assert!(OnHold.can_transition(CheckedOut));
        assert!(OnHold.can_transition(Available));
        // expiry reassignment to the next queued borrower
        assert!(OnHold.can_transition(OnHold));
    }

    #[test]
    fn terminal_states_reject_circulation() {
        assert!(!Withdrawn.can_transition(Available));
        assert!(!Withdrawn.can_transition(CheckedOut));
        assert!(!Lost.can_transition(CheckedOut));
        assert!(!Repair.can_transition(CheckedOut));
        assert!(!OnHold.can_transition(Lost));
    }

    #[test]
    fn unlisted_transition_reports_pair() {
        let err = Lost.validate_transition(CheckedOut).unwrap_err();
        match err {
            crate::error::AppError::InvalidTransition { entity, from, to } => {
                assert_eq!(entity, "item");
                assert_eq!(from, "lost");
                assert_eq!(to, "checked_out");
            }
            _ => panic!("expected InvalidTransition"),
        }
    }

    #[test]
    fn codes_round_trip() {
        for s in [Available, CheckedOut, OnHold, Lost, Withdrawn, Repair] {
            assert_eq!(ItemStatus::parse(s.as_code()).unwrap(), s);
        }
        assert!(ItemStatus::parse("gone").is_err());
    }
}
