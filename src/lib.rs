//! Libris library lending server
//!
//! REST JSON API for managing users, books and loans, backed by PostgreSQL
//! with an optional Redis read cache.

use std::sync::Arc;

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<services::Services>,
}
