//! Repository layer for database operations
//!
//! Each store contract is a trait so that services can run against the
//! PostgreSQL [`Repository`], the cache decorator, or a test double.

pub mod books;
pub mod loans;
pub mod users;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        book::{Book, CreateBook, UpdateBook},
        loan::Loan,
        user::{NewUser, UpdateUser, User, UserCredentials},
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// All users with their held books
    async fn list_users(&self) -> AppResult<Vec<User>>;
    async fn get_user(&self, id: i32) -> AppResult<User>;
    async fn find_credentials(&self, email: &str) -> AppResult<Option<UserCredentials>>;
    async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool>;
    async fn create_user(&self, user: NewUser) -> AppResult<User>;
    async fn update_user(&self, user: UpdateUser) -> AppResult<User>;
    async fn delete_user(&self, id: i32) -> AppResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn list_books(&self) -> AppResult<Vec<Book>>;
    async fn get_book(&self, id: i32) -> AppResult<Book>;
    async fn create_book(&self, book: CreateBook) -> AppResult<Book>;
    async fn update_book(&self, book: UpdateBook) -> AppResult<Book>;
    async fn delete_book(&self, id: i32) -> AppResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoanStore: Send + Sync {
    /// Open a loan and mark the book unavailable, atomically
    async fn take_book(&self, user_id: i32, book_id: i32) -> AppResult<Loan>;
    /// Close the open loan and mark the book available, atomically
    async fn return_book(&self, user_id: i32, book_id: i32) -> AppResult<Loan>;
    /// User currently holding the book, if any
    async fn book_holder(&self, book_id: i32) -> AppResult<Option<i32>>;
}

/// Everything the services need from persistence
#[async_trait]
pub trait Store: UserStore + BookStore + LoanStore {
    /// Round-trip to the store of record, used by the readiness probe
    async fn ping(&self) -> AppResult<()>;
}

/// PostgreSQL repository holding the connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for Repository {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
