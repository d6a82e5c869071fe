//! Biblos — School Library Circulation Backend
//!
//! The circulation and hold lifecycle engine for a school library:
//! checkout/checkin/renewal, FIFO hold queueing and fulfillment, and the
//! durable job queue driving time-based hold expiry. Catalog, user and
//! location management live in sibling services; this crate consumes their
//! lookup contracts only.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod pagination;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
