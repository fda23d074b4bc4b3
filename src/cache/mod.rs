//! Cache-aside layer in front of the store of record.
//!
//! [`CachedStore`] wraps any store and implements the same traits. Reads by id
//! go through the cache; writes go to the store first and then drop the
//! affected keys. Cache failures are logged and never surface to callers.
//!
//! A reader that missed can race a writer: it loads the old record, the
//! writer commits and invalidates, then the reader writes the old record
//! back. Entries have no expiry, so every write-back is followed by a second
//! store read and the entry is dropped when the two reads disagree.

pub mod redis;

#[cfg(test)]
pub mod memory;

use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    error::AppResult,
    models::{
        book::{Book, CreateBook, UpdateBook},
        loan::Loan,
        user::{NewUser, UpdateUser, User, UserCredentials},
    },
    repository::{BookStore, LoanStore, Store, UserStore},
};

/// Minimal key-value contract the cache layer needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;
    /// Store without expiry
    async fn set(&self, key: &str, value: String) -> AppResult<()>;
    async fn delete(&self, key: &str) -> AppResult<()>;
}

pub fn user_key(id: i32) -> String {
    format!("user:{}", id)
}

pub fn book_key(id: i32) -> String {
    format!("book:{}", id)
}

/// Store decorator adding cache-aside reads and invalidate-on-write
pub struct CachedStore<S> {
    inner: S,
    cache: Option<Arc<dyn Cache>>,
}

impl<S> CachedStore<S> {
    pub fn new(inner: S, cache: Arc<dyn Cache>) -> Self {
        Self {
            inner,
            cache: Some(cache),
        }
    }

    /// Pass-through mode, every read hits the store
    pub fn without_cache(inner: S) -> Self {
        Self { inner, cache: None }
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    tracing::debug!(key, "Cache hit");
                    Some(value)
                }
                Err(e) => {
                    tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed");
                None
            }
        }
    }

    /// True when the entry was written
    async fn populate<T: Serialize + Sync>(&self, key: &str, value: &T) -> bool {
        let Some(cache) = self.cache.as_ref() else {
            return false;
        };
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to encode cache entry");
                return false;
            }
        };
        match cache.set(key, raw).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache write failed");
                false
            }
        }
    }

    /// Serve `key` from the cache, or load the record and write it back
    async fn read_through<T, F, Fut>(&self, key: &str, load: F) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned + PartialEq + Send + Sync,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = AppResult<T>> + Send,
    {
        if let Some(hit) = self.lookup::<T>(key).await {
            return Ok(hit);
        }

        let value = load().await?;
        if self.populate(key, &value).await {
            match load().await {
                Ok(current) if current == value => {}
                _ => {
                    tracing::debug!(key, "Record changed during write-back");
                    self.invalidate(key).await;
                }
            }
        }
        Ok(value)
    }

    async fn invalidate(&self, key: &str) {
        if let Some(cache) = self.cache.as_ref() {
            if let Err(e) = cache.delete(key).await {
                tracing::error!(key, error = %e, "Cache invalidation failed");
            }
        }
    }
}

#[async_trait]
impl<S: UserStore> UserStore for CachedStore<S> {
    async fn list_users(&self) -> AppResult<Vec<User>> {
        self.inner.list_users().await
    }

    async fn get_user(&self, id: i32) -> AppResult<User> {
        self.read_through(&user_key(id), || self.inner.get_user(id)).await
    }

    async fn find_credentials(&self, email: &str) -> AppResult<Option<UserCredentials>> {
        self.inner.find_credentials(email).await
    }

    async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        self.inner.email_exists(email, exclude_id).await
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        self.inner.create_user(user).await
    }

    async fn update_user(&self, user: UpdateUser) -> AppResult<User> {
        let id = user.id;
        let updated = self.inner.update_user(user).await?;
        self.invalidate(&user_key(id)).await;
        Ok(updated)
    }

    async fn delete_user(&self, id: i32) -> AppResult<()> {
        self.inner.delete_user(id).await?;
        self.invalidate(&user_key(id)).await;
        Ok(())
    }
}

#[async_trait]
impl<S: BookStore + LoanStore> BookStore for CachedStore<S> {
    async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.inner.list_books().await
    }

    async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.read_through(&book_key(id), || self.inner.get_book(id)).await
    }

    async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        self.inner.create_book(book).await
    }

    async fn update_book(&self, book: UpdateBook) -> AppResult<Book> {
        let id = book.id;
        let updated = self.inner.update_book(book).await?;
        self.invalidate(&book_key(id)).await;
        // The holder's cached record embeds this book
        match self.inner.book_holder(id).await {
            Ok(Some(user_id)) => self.invalidate(&user_key(user_id)).await,
            Ok(None) => {}
            Err(e) => tracing::warn!(book_id = id, error = %e, "Could not resolve book holder"),
        }
        Ok(updated)
    }

    async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.inner.delete_book(id).await?;
        self.invalidate(&book_key(id)).await;
        Ok(())
    }
}

#[async_trait]
impl<S: LoanStore> LoanStore for CachedStore<S> {
    async fn take_book(&self, user_id: i32, book_id: i32) -> AppResult<Loan> {
        let loan = self.inner.take_book(user_id, book_id).await?;
        self.invalidate(&user_key(user_id)).await;
        self.invalidate(&book_key(book_id)).await;
        Ok(loan)
    }

    async fn return_book(&self, user_id: i32, book_id: i32) -> AppResult<Loan> {
        let loan = self.inner.return_book(user_id, book_id).await?;
        self.invalidate(&user_key(user_id)).await;
        self.invalidate(&book_key(book_id)).await;
        Ok(loan)
    }

    async fn book_holder(&self, book_id: i32) -> AppResult<Option<i32>> {
        self.inner.book_holder(book_id).await
    }
}

#[async_trait]
impl<S: Store> Store for CachedStore<S> {
    async fn ping(&self) -> AppResult<()> {
        self.inner.ping().await
    }
}
