//! Repository layer for book and user persistence
//!
//! The checkout coordinator only sees the [`BookStore`] trait, so the
//! Postgres implementation can be swapped for the in-memory one in tests.

pub mod books;
pub mod memory;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{Book, User},
};

/// Persistent book store.
///
/// The `mark_*` and `revert_checkout` writes are row-level conditional
/// updates and return the number of rows affected; zero means the
/// precondition on `checked_out` did not hold or the book does not exist.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    /// All stored books, ordered by global index
    async fn list_books(&self) -> AppResult<Vec<Book>>;

    async fn find_book(&self, index: i32) -> AppResult<Option<Book>>;

    async fn book_exists(&self, title: &str, author: &str) -> AppResult<bool>;

    /// Insert a book and return it with its store-assigned global index
    async fn insert_book(&self, title: &str, author: &str) -> AppResult<Book>;

    async fn update_book(&self, index: i32, title: &str, author: &str) -> AppResult<u64>;

    /// `checked_out = true, take_count + 1` where `checked_out = false`
    async fn mark_checked_out(&self, index: i32) -> AppResult<u64>;

    /// `checked_out = false` where `checked_out = true`
    async fn mark_returned(&self, index: i32) -> AppResult<u64>;

    /// Undo a `mark_checked_out`: `checked_out = false, take_count - 1` where `checked_out = true`
    async fn revert_checkout(&self, index: i32) -> AppResult<u64>;

    async fn ping(&self) -> AppResult<()>;
}

/// Registered user store. Soft-deleted users are invisible to every lookup.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        email: Option<&str>,
    ) -> AppResult<User>;

    async fn find_by_id(&self, id: i32) -> AppResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// One page of active users ordered by username, plus the active user count
    async fn list_users(&self, limit: i64, offset: i64) -> AppResult<(Vec<User>, i64)>;

    /// Overwrite the given fields; `None` keeps the current value.
    /// Returns `None` when no active user has this id.
    async fn update_user(
        &self,
        id: i32,
        username: Option<&str>,
        password_hash: Option<&str>,
        email: Option<&str>,
    ) -> AppResult<Option<User>>;

    /// Soft delete; returns the number of rows affected
    async fn delete_user(&self, id: i32) -> AppResult<u64>;
}

/// Main repository struct holding the stores
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookStore>,
    pub users: Arc<dyn UserStore>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            users: Arc::new(users::UsersRepository::new(pool)),
        }
    }

    /// Repository backed by in-memory stores
    pub fn in_memory() -> Self {
        Self::with_books(Arc::new(memory::InMemoryBookStore::default()))
    }

    /// In-memory users with the given book store
    pub fn with_books(books: Arc<dyn BookStore>) -> Self {
        Self {
            books,
            users: Arc::new(memory::InMemoryUserStore::default()),
        }
    }
}
