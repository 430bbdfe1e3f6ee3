//! Books repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{map_unique_violation, AppResult},
    models::Book,
};

use super::BookStore;

const BOOK_COLUMNS: &str = "id, title, author, checked_out, take_count";

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookStore for BooksRepository {
    async fn list_books(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM book ORDER BY id",
            BOOK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    async fn find_book(&self, index: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM book WHERE id = $1",
            BOOK_COLUMNS
        ))
        .bind(index)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    async fn book_exists(&self, title: &str, author: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM book WHERE title = $1 AND author = $2)",
        )
        .bind(title)
        .bind(author)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_book(&self, title: &str, author: &str) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO book (title, author, checked_out, take_count)
            VALUES ($1, $2, FALSE, 0)
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(title)
        .bind(author)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "Book already exists"))
    }

    async fn update_book(&self, index: i32, title: &str, author: &str) -> AppResult<u64> {
        let result = sqlx::query("UPDATE book SET title = $1, author = $2 WHERE id = $3")
            .bind(title)
            .bind(author)
            .bind(index)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "Another book already has this title and author"))?;

        Ok(result.rows_affected())
    }

    async fn mark_checked_out(&self, index: i32) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE book
            SET checked_out = TRUE, take_count = take_count + 1
            WHERE id = $1 AND checked_out = FALSE
            "#,
        )
        .bind(index)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn mark_returned(&self, index: i32) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE book SET checked_out = FALSE WHERE id = $1 AND checked_out = TRUE",
        )
        .bind(index)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn revert_checkout(&self, index: i32) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE book
            SET checked_out = FALSE, take_count = GREATEST(take_count - 1, 0)
            WHERE id = $1 AND checked_out = TRUE
            "#,
        )
        .bind(index)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
