//! Loans repository: the take / return transactions

use async_trait::async_trait;
use chrono::Utc;

use super::{LoanStore, Repository};
use crate::{
    error::{AppError, AppResult},
    models::loan::Loan,
};

#[async_trait]
impl LoanStore for Repository {
    async fn take_book(&self, user_id: i32, book_id: i32) -> AppResult<Loan> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Check-and-flip in one statement; the row lock serializes concurrent takes
        let flipped = sqlx::query(
            "UPDATE books SET available = FALSE WHERE id = $1 AND available = TRUE",
        )
        .bind(book_id)
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
                    .bind(book_id)
                    .fetch_one(&mut *tx)
                    .await?;

            return Err(if exists {
                AppError::Conflict(format!("Book {} is not available", book_id))
            } else {
                AppError::NotFound(format!("Book with id {} not found", book_id))
            });
        }

        // A closed loan for the same pair is reopened
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO user_books (user_id, book_id, taken_date, return_date)
            VALUES ($1, $2, $3, NULL)
            ON CONFLICT (user_id, book_id)
            DO UPDATE SET taken_date = EXCLUDED.taken_date, return_date = NULL
            RETURNING user_id, book_id, taken_date, return_date
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|db| db.is_foreign_key_violation()) {
                AppError::NotFound(format!("User with id {} not found", user_id))
            } else {
                AppError::from(e)
            }
        })?;

        tx.commit().await?;

        tracing::info!(user_id, book_id, "Book taken");
        Ok(loan)
    }

    async fn return_book(&self, user_id: i32, book_id: i32) -> AppResult<Loan> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE user_books SET return_date = $3
            WHERE user_id = $1 AND book_id = $2 AND return_date IS NULL
            RETURNING user_id, book_id, taken_date, return_date
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::Conflict(format!(
                "Book {} is not held by user {}",
                book_id, user_id
            ))
        })?;

        sqlx::query("UPDATE books SET available = TRUE WHERE id = $1")
            .bind(book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id, book_id, "Book returned");
        Ok(loan)
    }

    async fn book_holder(&self, book_id: i32) -> AppResult<Option<i32>> {
        let holder = sqlx::query_scalar::<_, i32>(
            "SELECT user_id FROM user_books WHERE book_id = $1 AND return_date IS NULL",
        )
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(holder)
    }
}
