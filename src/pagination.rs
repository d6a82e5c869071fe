//! Opaque cursor pagination for loan/hold listings
//!
//! A cursor encodes a (sort_key, id) pair; clients must treat the token as
//! opaque. Listings sort by a timestamp column with the row id as a
//! tie-breaker, so the pair resumes a scan exactly where it stopped.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub sort_key: DateTime<Utc>,
    pub id: Uuid,
}

impl Cursor {
    pub fn new(sort_key: DateTime<Utc>, id: Uuid) -> Self {
        Self { sort_key, id }
    }

    pub fn encode(&self) -> String {
        let raw = format!("{}|{}", self.sort_key.timestamp_micros(), self.id);
        URL_SAFE_NO_PAD.encode(raw.as_bytes())
    }

    pub fn decode(token: &str) -> AppResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.as_bytes())
            .map_err(|_| AppError::Validation("Malformed cursor".to_string()))?;
        let raw = String::from_utf8(bytes)
            .map_err(|_| AppError::Validation("Malformed cursor".to_string()))?;
        let (micros, id) = raw
            .split_once('|')
            .ok_or_else(|| AppError::Validation("Malformed cursor".to_string()))?;
        let micros: i64 = micros
            .parse()
            .map_err(|_| AppError::Validation("Malformed cursor".to_string()))?;
        let sort_key = DateTime::<Utc>::from_timestamp_micros(micros)
            .ok_or_else(|| AppError::Validation("Malformed cursor".to_string()))?;
        let id = Uuid::parse_str(id)
            .map_err(|_| AppError::Validation("Malformed cursor".to_string()))?;
        Ok(Self { sort_key, id })
    }
}

/// One page of results plus the cursor for the next page (None at the end)
#[derive(Debug, Clone, serde::Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips() {
        let cursor = Cursor::new(Utc::now(), Uuid::new_v4());
        let token = cursor.encode();
        let decoded = Cursor::decode(&token).unwrap();
        // micro precision survives the trip
        assert_eq!(
            decoded.sort_key.timestamp_micros(),
            cursor.sort_key.timestamp_micros()
        );
        assert_eq!(decoded.id, cursor.id);
    }

    #[test]
    fn garbage_tokens_are_validation_errors() {
        for token in ["", "not-base64!!", "aGVsbG8"] {
            assert!(matches!(
                Cursor::decode(token),
                Err(AppError::Validation(_))
            ));
        }
    }
}
