//! Error types for Bookshelf server

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Numeric error codes returned in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchUser = 4,
    NoSuchBook = 5,
    BookNotAvailable = 7,
    Duplicate = 8,
    NotHeldByBorrower = 13,
    BadValue = 18,
    CatalogDivergence = 22,
    StoreUnavailable = 23,
}

/// Catalog operation during which a divergence was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogOperation {
    Checkout,
    Return,
    Update,
}

/// What the two stores disagreed about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceReason {
    /// The book table accepted the write but the in-memory catalog has no such available book.
    MissingFromCache,
    /// The borrower held the book in memory but the book table already has it returned.
    AlreadyReturned,
    /// The catalog index has the book but the book table has no such row.
    MissingFromStore,
    /// The return matched no row and the follow-up lookup failed.
    AlreadyReturnedOrMissing,
}

/// Outcome of the compensating action run before a divergence is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Compensation {
    Applied,
    Failed,
    NotRequired,
}

/// Context reported with every divergence between the book table and the catalog index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Divergence {
    pub index: i32,
    pub operation: CatalogOperation,
    pub reason: DivergenceReason,
    pub compensation: Compensation,
}

impl Divergence {
    /// The side whose view disagreed with the one that was just written
    pub fn disagreeing_side(&self) -> &'static str {
        match self.reason {
            DivergenceReason::MissingFromCache => "catalog index",
            DivergenceReason::AlreadyReturned
            | DivergenceReason::MissingFromStore
            | DivergenceReason::AlreadyReturnedOrMissing => "book store",
        }
    }
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "book {} during {:?}: {} disagreed ({:?}), compensation {:?}",
            self.index,
            self.operation,
            self.disagreeing_side(),
            self.reason,
            self.compensation
        )
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Book {0} is already checked out")]
    AlreadyCheckedOut(i32),

    #[error("Book {index} is not held by {borrower}")]
    NotHeldByBorrower { index: i32, borrower: String },

    #[error("Catalog divergence: {0}")]
    Divergence(Divergence),

    #[error("Book store unavailable: {0}")]
    Transport(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchBook, msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::Duplicate, msg.clone())
            }
            AppError::AlreadyCheckedOut(_) => {
                (StatusCode::CONFLICT, ErrorCode::BookNotAvailable, self.to_string())
            }
            AppError::NotHeldByBorrower { .. } => {
                (StatusCode::CONFLICT, ErrorCode::NotHeldByBorrower, self.to_string())
            }
            AppError::Divergence(divergence) => {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::CatalogDivergence,
                    divergence.to_string(),
                )
            }
            AppError::Transport(msg) => {
                tracing::error!("Book store transport error: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorCode::StoreUnavailable,
                    "Book store unavailable".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Maps unique-constraint violations to `Conflict`, everything else to `Database`
pub fn map_unique_violation(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(err),
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
