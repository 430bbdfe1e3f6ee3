//! In-memory stores, used by tests and for running without Postgres.
//!
//! `InMemoryBookStore` applies the same conditional-update rules as the
//! `book` table, and exposes a few hooks to put it out of line with the
//! catalog index on purpose.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
    error::{AppError, AppResult},
    models::{Book, User},
};

use super::{BookStore, UserStore};

#[derive(Debug, Default)]
struct BookTable {
    rows: BTreeMap<i32, Book>,
    last_index: i32,
}

#[derive(Debug, Default)]
pub struct InMemoryBookStore {
    table: Mutex<BookTable>,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryBookStore {
    /// Store pre-filled with the given `(title, author)` pairs, indexed from 1
    pub fn with_books<'a>(books: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut table = BookTable::default();
        for (title, author) in books {
            table.last_index += 1;
            let index = table.last_index;
            table.rows.insert(index, Book::new(index, title, author));
        }
        Self {
            table: Mutex::new(table),
            latency: Mutex::new(None),
        }
    }

    /// Delay every subsequent call by `latency`
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().await = latency;
    }

    /// Overwrite the `checked_out` flag behind the catalog's back
    pub async fn force_checked_out(&self, index: i32, checked_out: bool) -> bool {
        match self.table.lock().await.rows.get_mut(&index) {
            Some(book) => {
                book.checked_out = checked_out;
                true
            }
            None => false,
        }
    }

    /// Delete a row behind the catalog's back
    pub async fn remove(&self, index: i32) -> Option<Book> {
        self.table.lock().await.rows.remove(&index)
    }

    async fn delay(&self) {
        let latency = *self.latency.lock().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl BookStore for InMemoryBookStore {
    async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.delay().await;
        Ok(self.table.lock().await.rows.values().cloned().collect())
    }

    async fn find_book(&self, index: i32) -> AppResult<Option<Book>> {
        self.delay().await;
        Ok(self.table.lock().await.rows.get(&index).cloned())
    }

    async fn book_exists(&self, title: &str, author: &str) -> AppResult<bool> {
        self.delay().await;
        let table = self.table.lock().await;
        Ok(table
            .rows
            .values()
            .any(|b| b.title == title && b.author == author))
    }

    async fn insert_book(&self, title: &str, author: &str) -> AppResult<Book> {
        self.delay().await;
        let mut table = self.table.lock().await;
        if table
            .rows
            .values()
            .any(|b| b.title == title && b.author == author)
        {
            return Err(AppError::Conflict("Book already exists".to_string()));
        }
        table.last_index += 1;
        let book = Book::new(table.last_index, title, author);
        table.rows.insert(book.index, book.clone());
        Ok(book)
    }

    async fn update_book(&self, index: i32, title: &str, author: &str) -> AppResult<u64> {
        self.delay().await;
        let mut table = self.table.lock().await;
        if table
            .rows
            .values()
            .any(|b| b.index != index && b.title == title && b.author == author)
        {
            return Err(AppError::Conflict(
                "Another book already has this title and author".to_string(),
            ));
        }
        match table.rows.get_mut(&index) {
            Some(book) => {
                book.title = title.to_string();
                book.author = author.to_string();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn mark_checked_out(&self, index: i32) -> AppResult<u64> {
        self.delay().await;
        let mut table = self.table.lock().await;
        match table.rows.get_mut(&index) {
            Some(book) if !book.checked_out => {
                book.checked_out = true;
                book.take_count += 1;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn mark_returned(&self, index: i32) -> AppResult<u64> {
        self.delay().await;
        let mut table = self.table.lock().await;
        match table.rows.get_mut(&index) {
            Some(book) if book.checked_out => {
                book.checked_out = false;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn revert_checkout(&self, index: i32) -> AppResult<u64> {
        self.delay().await;
        let mut table = self.table.lock().await;
        match table.rows.get_mut(&index) {
            Some(book) if book.checked_out => {
                book.checked_out = false;
                book.take_count = (book.take_count - 1).max(0);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct UserTable {
    rows: BTreeMap<i32, User>,
    last_id: i32,
}

impl UserTable {
    /// Usernames stay reserved after a soft delete, as the unique constraint does
    fn username_taken(&self, username: &str, except: Option<i32>) -> bool {
        self.rows
            .values()
            .any(|u| u.username == username && Some(u.id) != except)
    }

    fn active_mut(&mut self, id: i32) -> Option<&mut User> {
        self.rows.get_mut(&id).filter(|u| u.deleted_at.is_none())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    table: Mutex<UserTable>,
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        email: Option<&str>,
    ) -> AppResult<User> {
        let mut table = self.table.lock().await;
        if table.username_taken(username, None) {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        table.last_id += 1;
        let user = User {
            id: table.last_id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            email: email.map(str::to_string),
            created_at: Utc::now(),
            deleted_at: None,
        };
        table.rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: i32) -> AppResult<Option<User>> {
        let table = self.table.lock().await;
        Ok(table
            .rows
            .get(&id)
            .filter(|u| u.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let table = self.table.lock().await;
        Ok(table
            .rows
            .values()
            .find(|u| u.username == username && u.deleted_at.is_none())
            .cloned())
    }

    async fn list_users(&self, limit: i64, offset: i64) -> AppResult<(Vec<User>, i64)> {
        let table = self.table.lock().await;
        let mut active: Vec<User> = table
            .rows
            .values()
            .filter(|u| u.deleted_at.is_none())
            .cloned()
            .collect();
        active.sort_by(|a, b| a.username.cmp(&b.username));

        let total = active.len() as i64;
        let page = active
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn update_user(
        &self,
        id: i32,
        username: Option<&str>,
        password_hash: Option<&str>,
        email: Option<&str>,
    ) -> AppResult<Option<User>> {
        let mut table = self.table.lock().await;
        if let Some(username) = username {
            if table.username_taken(username, Some(id)) {
                return Err(AppError::Conflict("Username already taken".to_string()));
            }
        }
        let Some(user) = table.active_mut(id) else {
            return Ok(None);
        };
        if let Some(username) = username {
            user.username = username.to_string();
        }
        if let Some(password_hash) = password_hash {
            user.password_hash = password_hash.to_string();
        }
        if let Some(email) = email {
            user.email = Some(email.to_string());
        }
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i32) -> AppResult<u64> {
        let mut table = self.table.lock().await;
        match table.active_mut(id) {
            Some(user) => {
                user.email = None;
                user.deleted_at = Some(Utc::now());
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_conditional_checkout_applies_once() {
        let store = InMemoryBookStore::with_books([("Dune", "Herbert")]);

        assert_eq!(store.mark_checked_out(1).await.unwrap(), 1);
        assert_eq!(store.mark_checked_out(1).await.unwrap(), 0);

        let book = store.find_book(1).await.unwrap().unwrap();
        assert!(book.checked_out);
        assert_eq!(book.take_count, 1);
    }

    #[tokio::test]
    async fn test_revert_restores_counter() {
        let store = InMemoryBookStore::with_books([("Dune", "Herbert")]);
        store.mark_checked_out(1).await.unwrap();

        assert_eq!(store.revert_checkout(1).await.unwrap(), 1);
        let book = store.find_book(1).await.unwrap().unwrap();
        assert!(!book.checked_out);
        assert_eq!(book.take_count, 0);
    }

    #[tokio::test]
    async fn test_missing_book_affects_no_rows() {
        let store = InMemoryBookStore::default();
        assert_eq!(store.mark_checked_out(42).await.unwrap(), 0);
        assert_eq!(store.mark_returned(42).await.unwrap(), 0);
        assert_eq!(store.update_book(42, "T", "A").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate() {
        let store = InMemoryBookStore::default();
        let book = store.insert_book("Dune", "Herbert").await.unwrap();
        assert_eq!(book.index, 1);
        assert!(matches!(
            store.insert_book("Dune", "Herbert").await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_deleted_user_is_hidden_but_keeps_username() {
        let store = InMemoryUserStore::default();
        let alice = store.create_user("alice", "hash", Some("a@example.com")).await.unwrap();
        store.create_user("bob", "hash", None).await.unwrap();

        assert_eq!(store.delete_user(alice.id).await.unwrap(), 1);
        assert_eq!(store.delete_user(alice.id).await.unwrap(), 0);
        assert!(store.find_by_id(alice.id).await.unwrap().is_none());
        assert!(store.find_by_username("alice").await.unwrap().is_none());
        assert!(store.update_user(alice.id, Some("carol"), None, None).await.unwrap().is_none());

        let (users, total) = store.list_users(10, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(users[0].username, "bob");
        assert!(matches!(
            store.create_user("alice", "hash", None).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_update_user_keeps_absent_fields() {
        let store = InMemoryUserStore::default();
        let alice = store.create_user("alice", "hash", Some("a@example.com")).await.unwrap();
        store.create_user("bob", "hash", None).await.unwrap();

        let updated = store
            .update_user(alice.id, None, Some("new-hash"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.username, "alice");
        assert_eq!(updated.password_hash, "new-hash");
        assert_eq!(updated.email.as_deref(), Some("a@example.com"));

        assert!(matches!(
            store.update_user(alice.id, Some("bob"), None, None).await,
            Err(AppError::Conflict(_))
        ));
    }
}
