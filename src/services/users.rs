//! User management service

use std::sync::Arc;

use validator::Validate;

use super::credentials::Credentials;
use crate::{
    error::{AppError, AppResult},
    models::user::{CreateUser, NewUser, UpdateUser, User, UserClaims},
    repository::{Store, UserStore},
};

#[derive(Clone)]
pub struct UsersService {
    store: Arc<dyn Store>,
    credentials: Credentials,
}

impl UsersService {
    pub fn new(store: Arc<dyn Store>, credentials: Credentials) -> Self {
        Self { store, credentials }
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        self.store.list_users().await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.store.get_user(id).await
    }

    /// Create a user with any role (administrators only)
    pub async fn create_user(&self, user: CreateUser) -> AppResult<User> {
        user.validate()?;

        if self.store.email_exists(&user.email, None).await? {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        let password_hash = self.credentials.hash_password(&user.password)?;
        let created = self
            .store
            .create_user(NewUser {
                name: user.name.trim().to_string(),
                email: user.email,
                password_hash,
                role: user.role.unwrap_or_default(),
            })
            .await?;

        tracing::info!(user_id = created.id, role = %created.role, "User created");
        Ok(created)
    }

    /// Update a user; non-admin sessions may only edit their own record and
    /// may not change roles
    pub async fn update_user(&self, claims: &UserClaims, user: UpdateUser) -> AppResult<User> {
        user.validate()?;

        let current = self.store.get_user(user.id).await?;
        claims.require_self_or_admin(&current.email)?;

        if let Some(role) = user.role {
            if role != current.role && !claims.is_admin() {
                return Err(AppError::Authorization(
                    "Only administrators may change roles".to_string(),
                ));
            }
        }

        if self.store.email_exists(&user.email, Some(user.id)).await? {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        let updated = self
            .store
            .update_user(UpdateUser {
                name: user.name.trim().to_string(),
                ..user
            })
            .await?;

        tracing::info!(user_id = updated.id, "User updated");
        Ok(updated)
    }

    pub async fn delete_user(&self, id: i32) -> AppResult<()> {
        self.store.delete_user(id).await?;
        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }
}
