//! Books repository for database operations

use async_trait::async_trait;

use super::{BookStore, Repository};
use crate::{
    error::{AppError, AppResult},
    models::book::{Book, CreateBook, UpdateBook},
};

#[async_trait]
impl BookStore for Repository {
    async fn list_books(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT id, title, author, available FROM books ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn get_book(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT id, title, author, available FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        let row = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author)
            VALUES ($1, $2)
            RETURNING id, title, author, available
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_book(&self, book: UpdateBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET title = $1, author = $2
            WHERE id = $3
            RETURNING id, title, author, available
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book.id)))
    }

    async fn delete_book(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Lock the row so a concurrent take cannot slip in before the delete
        let available: Option<bool> =
            sqlx::query_scalar("SELECT available FROM books WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        match available {
            None => return Err(AppError::NotFound(format!("Book with id {} not found", id))),
            Some(false) => {
                return Err(AppError::Conflict(format!("Book {} is on loan", id)));
            }
            Some(true) => {}
        }

        sqlx::query("DELETE FROM user_books WHERE book_id = $1 AND return_date IS NOT NULL")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
