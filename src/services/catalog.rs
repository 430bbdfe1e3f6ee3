//! Catalog query surface
//!
//! Read-only projections of the catalog index. Every call takes the shared
//! lock for the duration of one copy and nothing else.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    error::AppResult,
    models::{Book, Holding},
    repository::BookStore,
};

use super::catalog_index::CatalogIndex;

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn BookStore>,
    catalog: Arc<RwLock<CatalogIndex>>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn BookStore>, catalog: Arc<RwLock<CatalogIndex>>) -> Self {
        Self { store, catalog }
    }

    /// Registered authors, in registration order
    pub async fn list_authors(&self) -> Vec<String> {
        self.catalog.read().await.authors()
    }

    /// Authors with at least one available book
    pub async fn list_distinct_authors(&self) -> Vec<String> {
        self.catalog.read().await.distinct_authors()
    }

    pub async fn list_books_by_author(&self, author: &str) -> Vec<Book> {
        self.catalog.read().await.books_by_author(author.trim())
    }

    /// Books held by a borrower. Unknown borrowers hold nothing.
    pub async fn list_books_held_by(&self, borrower: &str) -> Vec<Book> {
        self.catalog.read().await.books_held_by(borrower.trim())
    }

    pub async fn list_holdings(&self) -> Vec<Holding> {
        self.catalog.read().await.holdings()
    }

    pub async fn list_available_books(&self) -> Vec<Book> {
        self.catalog.read().await.available_books()
    }

    /// Every stored book, as the book table sees it
    pub async fn list_stored_books(&self) -> AppResult<Vec<Book>> {
        self.store.list_books().await
    }

    /// Book store connectivity check
    pub async fn ping_store(&self) -> AppResult<()> {
        self.store.ping().await
    }
}
