//! Business logic services

pub mod auth;
pub mod catalog;
pub mod catalog_index;
pub mod checkout;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::{config::AuthConfig, error::AppResult, repository::Repository};

use catalog_index::CatalogIndex;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub checkout: checkout::CheckoutCoordinator,
}

impl Services {
    /// Create all services, bulk-loading the catalog index from the book store
    pub async fn new(
        repository: Repository,
        auth_config: AuthConfig,
        store_timeout: Duration,
    ) -> AppResult<Self> {
        let books = repository.books.list_books().await?;
        let mut index = CatalogIndex::new();
        index.bulk_load(books);
        tracing::info!(
            books = index.available_books().len(),
            authors = index.authors().len(),
            "Catalog index loaded"
        );

        let catalog = Arc::new(RwLock::new(index));

        Ok(Self {
            auth: auth::AuthService::new(repository.users.clone(), auth_config),
            catalog: catalog::CatalogService::new(repository.books.clone(), catalog.clone()),
            checkout: checkout::CheckoutCoordinator::new(repository.books, catalog, store_timeout),
        })
    }
}
