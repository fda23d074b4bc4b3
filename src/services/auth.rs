//! Registration, login and session checks

use std::sync::Arc;

use validator::Validate;

use super::credentials::Credentials;
use crate::{
    error::{AppError, AppResult},
    models::user::{
        LoginRequest, LoginResponse, NewUser, RegisterUser, Role, SessionInfo, User, UserClaims,
    },
    repository::{Store, UserStore},
};

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    credentials: Credentials,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, credentials: Credentials) -> Self {
        Self { store, credentials }
    }

    /// Self-service sign-up; the account always gets the `user` role
    pub async fn register(&self, user: RegisterUser) -> AppResult<User> {
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
                role: Role::User,
            })
            .await?;

        tracing::info!(user_id = created.id, "User registered");
        Ok(created)
    }

    /// Exchange credentials for a session token
    pub async fn login(&self, request: LoginRequest) -> AppResult<LoginResponse> {
        request.validate()?;

        let invalid = || AppError::Authentication("Invalid email or password".to_string());

        let credentials = self
            .store
            .find_credentials(&request.email)
            .await?
            .ok_or_else(invalid)?;

        if !self
            .credentials
            .verify_password(&request.password, &credentials.password)
        {
            tracing::info!(user_id = credentials.id, "Login rejected");
            return Err(invalid());
        }

        let (token, claims) = self
            .credentials
            .issue_token(&credentials.email, credentials.role)?;
        let user = self.store.get_user(credentials.id).await?;

        tracing::info!(user_id = user.id, role = %user.role, "User logged in");
        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_at: claims.expires_at(),
            user,
        })
    }

    /// Describe an already verified session
    pub fn check(&self, claims: &UserClaims) -> SessionInfo {
        SessionInfo::from(claims)
    }

    /// Create the configured administrator when no account uses that e-mail.
    /// Returns whether an account was created.
    pub async fn bootstrap_admin(&self, email: &str, password: &str) -> AppResult<bool> {
        if self.store.email_exists(email, None).await? {
            return Ok(false);
        }

        let password_hash = self.credentials.hash_password(password)?;
        let admin = self
            .store
            .create_user(NewUser {
                name: "Administrator".to_string(),
                email: email.to_string(),
                password_hash,
                role: Role::Admin,
            })
            .await?;

        tracing::info!(user_id = admin.id, "Bootstrap administrator created");
        Ok(true)
    }
}
