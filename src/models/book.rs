//! Book model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Book record from the `book` table, as placed in the catalog index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    /// Global index assigned by the book store
    #[sqlx(rename = "id")]
    pub index: i32,
    pub title: String,
    pub author: String,
    pub checked_out: bool,
    /// Lifetime number of checkouts
    pub take_count: i32,
    /// Per-author sequence number, assigned by the catalog index (0 until placed)
    #[sqlx(default)]
    #[serde(default)]
    pub sequence: i32,
}

impl Book {
    /// A freshly stored book that has never been borrowed
    pub fn new(index: i32, title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
            author: author.into(),
            checked_out: false,
            take_count: 0,
            sequence: 0,
        }
    }
}

/// Books currently checked out to one borrower
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Holding {
    pub borrower: String,
    pub books: Vec<Book>,
}
