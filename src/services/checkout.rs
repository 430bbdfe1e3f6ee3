//! Checkout coordinator
//!
//! Keeps the `book` table and the in-memory catalog index aligned without a
//! shared transaction. Both checkout and return check the index, write the
//! store, then move the book in the index. Every failure point after the
//! store write runs a compensating action before the error is returned.
//!
//! Operations on the same global index are serialized by a striped book lock
//! held for the whole protocol. The catalog write lock is only taken for the
//! in-memory steps and is never held across a store call. A book moves between
//! the available set and a borrower inside a single write-lock section, so
//! readers always find it in exactly one place.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::{
    error::{AppError, AppResult, CatalogOperation, Compensation, Divergence, DivergenceReason},
    models::Book,
    repository::BookStore,
};

use super::catalog_index::CatalogIndex;

const BOOK_LOCK_STRIPES: usize = 64;

/// Fixed set of async mutexes; a global index always maps to the same stripe
#[derive(Clone)]
struct BookLocks {
    stripes: Arc<[Mutex<()>]>,
}

impl Default for BookLocks {
    fn default() -> Self {
        Self {
            stripes: (0..BOOK_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }
}

impl BookLocks {
    fn stripe(&self, index: i32) -> usize {
        index.rem_euclid(self.stripes.len() as i32) as usize
    }

    async fn acquire(&self, index: i32) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe(index)].lock().await
    }
}

/// Log a divergence and wrap it in an error. Compensation has already run.
fn diverged(divergence: Divergence) -> AppError {
    tracing::error!(
        index = divergence.index,
        operation = ?divergence.operation,
        reason = ?divergence.reason,
        side = divergence.disagreeing_side(),
        compensation = ?divergence.compensation,
        "Book store and catalog index diverged"
    );
    AppError::Divergence(divergence)
}

pub(crate) fn validate_index(index: i32) -> AppResult<()> {
    if index < 1 {
        return Err(AppError::Validation(format!("invalid book index {}", index)));
    }
    Ok(())
}

/// Trimmed, non-empty value of a required name field
pub(crate) fn required<'a>(field: &str, value: &'a str) -> AppResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(value)
}

#[derive(Clone)]
pub struct CheckoutCoordinator {
    store: Arc<dyn BookStore>,
    catalog: Arc<RwLock<CatalogIndex>>,
    book_locks: BookLocks,
    store_timeout: Duration,
}

impl CheckoutCoordinator {
    pub fn new(
        store: Arc<dyn BookStore>,
        catalog: Arc<RwLock<CatalogIndex>>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            book_locks: BookLocks::default(),
            store_timeout,
        }
    }

    /// Run a store call under the configured deadline. A timeout is a transport error.
    async fn with_deadline<T>(
        &self,
        call: &str,
        index: i32,
        fut: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Transport(format!(
                "{} for book {} timed out after {:?}",
                call, index, self.store_timeout
            ))),
        }
    }

    /// Check out the book with global index `index` to `borrower`
    pub async fn checkout(&self, index: i32, borrower: &str) -> AppResult<Book> {
        validate_index(index)?;
        let borrower = required("username", borrower)?;
        let _book_guard = self.book_locks.acquire(index).await;

        let rows = self
            .with_deadline("mark_checked_out", index, self.store.mark_checked_out(index))
            .await?;

        if rows == 0 {
            let existing = self
                .with_deadline("find_book", index, self.store.find_book(index))
                .await?;
            return match existing {
                Some(_) => {
                    tracing::warn!(index, borrower, "Checkout rejected: book already checked out");
                    Err(AppError::AlreadyCheckedOut(index))
                }
                None => Err(AppError::NotFound(format!("Book with index {} not found", index))),
            };
        }

        let placed = {
            let mut catalog = self.catalog.write().await;
            match catalog.remove_from_available(index) {
                Some(mut book) => {
                    book.checked_out = true;
                    book.take_count += 1;
                    catalog.assign_to_borrower(borrower, book.clone());
                    Some(book)
                }
                None => None,
            }
        };

        match placed {
            Some(book) => {
                tracing::info!(index, borrower, title = %book.title, "Book checked out");
                Ok(book)
            }
            None => {
                let compensation = self.revert_checkout(index).await;
                Err(diverged(Divergence {
                    index,
                    operation: CatalogOperation::Checkout,
                    reason: DivergenceReason::MissingFromCache,
                    compensation,
                }))
            }
        }
    }

    /// Undo the store side of a checkout that could not be placed in memory
    async fn revert_checkout(&self, index: i32) -> Compensation {
        match self
            .with_deadline("revert_checkout", index, self.store.revert_checkout(index))
            .await
        {
            Ok(rows) if rows > 0 => Compensation::Applied,
            Ok(_) => {
                tracing::error!(index, "Checkout revert matched no row");
                Compensation::Failed
            }
            Err(e) => {
                tracing::error!(index, error = %e, "Checkout revert failed, book stays flagged as checked out");
                Compensation::Failed
            }
        }
    }

    /// Return the book with global index `index` from `borrower`
    pub async fn return_book(&self, index: i32, borrower: &str) -> AppResult<Book> {
        validate_index(index)?;
        let borrower = required("username", borrower)?;
        let _book_guard = self.book_locks.acquire(index).await;

        if !self.catalog.read().await.is_held_by(borrower, index) {
            return Err(AppError::NotHeldByBorrower {
                index,
                borrower: borrower.to_string(),
            });
        }

        // An ambiguous outcome counts as not applied: the borrower keeps the book.
        let rows = self
            .with_deadline("mark_returned", index, self.store.mark_returned(index))
            .await
            .map_err(|e| {
                tracing::warn!(index, borrower, error = %e, "Return not applied, book left with borrower");
                e
            })?;

        let returned = self
            .catalog
            .write()
            .await
            .return_to_available(borrower, index);

        if rows == 0 {
            // The store says the book is not checked out; it now sits in the available set.
            let reason = match self
                .with_deadline("find_book", index, self.store.find_book(index))
                .await
            {
                Ok(Some(_)) => DivergenceReason::AlreadyReturned,
                Ok(None) => DivergenceReason::MissingFromStore,
                Err(e) => {
                    tracing::warn!(index, error = %e, "Could not classify unmatched return");
                    DivergenceReason::AlreadyReturnedOrMissing
                }
            };
            let compensation = if returned.is_some() {
                Compensation::Applied
            } else {
                Compensation::Failed
            };
            return Err(diverged(Divergence {
                index,
                operation: CatalogOperation::Return,
                reason,
                compensation,
            }));
        }

        match returned {
            Some(book) => {
                tracing::info!(index, borrower, title = %book.title, "Book returned");
                Ok(book)
            }
            None => Err(diverged(Divergence {
                index,
                operation: CatalogOperation::Return,
                reason: DivergenceReason::MissingFromCache,
                compensation: Compensation::NotRequired,
            })),
        }
    }

    /// Add a new book. The store assigns the global index, the catalog the sequence number.
    pub async fn add_book(&self, title: &str, author: &str) -> AppResult<Book> {
        let title = required("title", title)?;
        let author = required("author", author)?;

        let exists = self
            .with_deadline("book_exists", 0, self.store.book_exists(title, author))
            .await?;
        if exists {
            return Err(AppError::Conflict(format!(
                "Book '{}' by {} already exists",
                title, author
            )));
        }

        let stored = self
            .with_deadline("insert_book", 0, self.store.insert_book(title, author))
            .await?;
        let book = self.catalog.write().await.add_book(stored);
        tracing::info!(index = book.index, sequence = book.sequence, author = %book.author, "Book added");
        Ok(book)
    }

    /// Change title and author of an existing book.
    ///
    /// The book table is only written when the catalog index has the book.
    pub async fn update_book(&self, index: i32, title: &str, author: &str) -> AppResult<Book> {
        validate_index(index)?;
        let title = required("title", title)?;
        let author = required("author", author)?;
        let _book_guard = self.book_locks.acquire(index).await;

        if !self.catalog.read().await.contains(index) {
            let stored = self
                .with_deadline("find_book", index, self.store.find_book(index))
                .await?;
            return match stored {
                Some(_) => Err(diverged(Divergence {
                    index,
                    operation: CatalogOperation::Update,
                    reason: DivergenceReason::MissingFromCache,
                    compensation: Compensation::NotRequired,
                })),
                None => Err(AppError::NotFound(format!("Book with index {} not found", index))),
            };
        }

        let rows = self
            .with_deadline("update_book", index, self.store.update_book(index, title, author))
            .await?;
        if rows == 0 {
            return Err(diverged(Divergence {
                index,
                operation: CatalogOperation::Update,
                reason: DivergenceReason::MissingFromStore,
                compensation: Compensation::NotRequired,
            }));
        }

        let relocated = self.catalog.write().await.relocate(index, title, author);
        relocated.ok_or_else(|| {
            diverged(Divergence {
                index,
                operation: CatalogOperation::Update,
                reason: DivergenceReason::MissingFromCache,
                compensation: Compensation::Failed,
            })
        })
    }

    /// Register an author, possibly without any book
    pub async fn add_author(&self, name: &str) -> AppResult<()> {
        let name = required("author name", name)?;
        if self.catalog.write().await.register_author(name) {
            tracing::info!(author = name, "Author registered");
        }
        Ok(())
    }
}
