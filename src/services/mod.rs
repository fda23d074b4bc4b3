//! Business logic services

pub mod auth;
pub mod books;
pub mod credentials;
pub mod lending;
pub mod users;

use std::sync::Arc;

use crate::{config::AuthConfig, error::AppResult, repository::Store};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub users: users::UsersService,
    pub books: books::BooksService,
    pub lending: lending::LendingService,
    pub credentials: credentials::Credentials,
    store: Arc<dyn Store>,
}

impl Services {
    /// Create all services on top of the given store
    pub fn new(store: Arc<dyn Store>, auth_config: &AuthConfig) -> AppResult<Self> {
        let credentials = credentials::Credentials::new(auth_config)?;

        Ok(Self {
            auth: auth::AuthService::new(store.clone(), credentials.clone()),
            users: users::UsersService::new(store.clone(), credentials.clone()),
            books: books::BooksService::new(store.clone()),
            lending: lending::LendingService::new(store.clone()),
            credentials,
            store,
        })
    }

    /// Check the store of record is reachable
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }
}
