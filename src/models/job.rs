//! Background job model and payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Closed enumeration of deferred work the engine knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ExpireReadyHolds,
}

impl JobKind {
    pub fn as_code(&self) -> &'static str {
        match self {
            JobKind::ExpireReadyHolds => "expire_ready_holds",
        }
    }

    pub fn parse(code: &str) -> AppResult<Self> {
        match code {
            "expire_ready_holds" => Ok(JobKind::ExpireReadyHolds),
            other => Err(AppError::Validation(format!("Unknown job kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn as_code(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }

    pub fn parse(code: &str) -> AppResult<Self> {
        match code {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            "canceled" => Ok(JobStatus::Canceled),
            other => Err(AppError::Validation(format!(
                "Unknown job status '{}'",
                other
            ))),
        }
    }
}

/// Durable unit of deferred work, claimable by one of several workers
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BackgroundJob {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    #[schema(value_type = Object)]
    pub result: Option<serde_json::Value>,
    pub last_error: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub run_at: DateTime<Utc>,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for [`JobKind::ExpireReadyHolds`]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExpireReadyPayload {
    pub actor_user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Outcome of one expiry sweep.
///
/// `processed` holds were marked expired; `transferred`/`released` describe
/// what happened to their items. `skipped` counts candidates left alone
/// (lock contention, state changed) plus processed holds whose item was in
/// a non-resumable state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExpireReadySummary {
    pub candidates_total: i64,
    pub processed: i64,
    pub transferred: i64,
    pub released: i64,
    pub skipped: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expire_payload_accepts_minimal_json() {
        let payload: ExpireReadyPayload = serde_json::from_value(serde_json::json!({
            "actor_user_id": "7b4a3b9d-9a55-4f03-9d9e-7d9edb1c5f6b"
        }))
        .unwrap();
        assert!(payload.as_of.is_none());
        assert!(payload.limit.is_none());
        assert!(payload.note.is_none());
    }

    #[test]
    fn job_kind_codes_round_trip() {
        assert_eq!(
            JobKind::parse(JobKind::ExpireReadyHolds.as_code()).unwrap(),
            JobKind::ExpireReadyHolds
        );
        assert!(JobKind::parse("sweep_the_floor").is_err());
    }
}
