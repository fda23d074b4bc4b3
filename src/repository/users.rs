//! Users repository for database operations

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::FromRow;

use super::{Repository, UserStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        user::{NewUser, UpdateUser, User, UserCredentials, UserRow},
    },
};

/// Book joined with the user holding it
#[derive(Debug, FromRow)]
struct HeldBookRow {
    user_id: i32,
    id: i32,
    title: String,
    author: String,
    available: bool,
}

impl From<HeldBookRow> for Book {
    fn from(row: HeldBookRow) -> Self {
        Book {
            id: row.id,
            title: row.title,
            author: row.author,
            available: row.available,
        }
    }
}

impl Repository {
    /// Books currently on loan to a user
    async fn users_held_books(&self, user_id: i32) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT b.id, b.title, b.author, b.available
            FROM books b
            JOIN user_books ub ON ub.book_id = b.id
            WHERE ub.user_id = $1 AND ub.return_date IS NULL
            ORDER BY ub.taken_date
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }
}

#[async_trait]
impl UserStore for Repository {
    async fn list_users(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, role FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let held = sqlx::query_as::<_, HeldBookRow>(
            r#"
            SELECT ub.user_id, b.id, b.title, b.author, b.available
            FROM user_books ub
            JOIN books b ON b.id = ub.book_id
            WHERE ub.return_date IS NULL
            ORDER BY ub.taken_date
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut books_by_user: HashMap<i32, Vec<Book>> = HashMap::new();
        for row in held {
            books_by_user.entry(row.user_id).or_default().push(row.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let books = books_by_user.remove(&row.id).unwrap_or_default();
                row.with_books(books)
            })
            .collect())
    }

    async fn get_user(&self, id: i32) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, role FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;

        let books = self.users_held_books(id).await?;
        Ok(row.with_books(books))
    }

    async fn find_credentials(&self, email: &str) -> AppResult<Option<UserCredentials>> {
        let credentials = sqlx::query_as::<_, UserCredentials>(
            "SELECT id, email, password, role FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credentials)
    }

    async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND id != $2)",
            )
            .bind(email)
            .bind(id)
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (name, email, password, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, role
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.with_books(Vec::new()))
    }

    async fn update_user(&self, user: UpdateUser) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET name = $1, email = $2, role = COALESCE($3, role)
            WHERE id = $4
            RETURNING id, name, email, role
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user.id)))?;

        let books = self.users_held_books(row.id).await?;
        Ok(row.with_books(books))
    }

    async fn delete_user(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Conflicts with the key-share lock a concurrent take holds on this row
        let found: Option<i32> =
            sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        if found.is_none() {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }

        let holds_books: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM user_books WHERE user_id = $1 AND return_date IS NULL)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if holds_books {
            return Err(AppError::Conflict(format!(
                "User {} still holds books",
                id
            )));
        }

        // An open loan left behind fails the foreign key below
        sqlx::query("DELETE FROM user_books WHERE user_id = $1 AND return_date IS NOT NULL")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
