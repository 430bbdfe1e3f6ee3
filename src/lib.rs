//! Bookshelf Library Catalog Server
//!
//! A REST JSON API for a library's book catalog: an in-memory catalog index
//! kept aligned with a Postgres `book` table, plus checkout and return of
//! books to named borrowers.

use std::sync::Arc;

pub mod api;
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
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
