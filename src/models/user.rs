//! User model and related types

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use validator::Validate;

use super::{book::Book, validation::not_blank};
use crate::error::AppError;

/// User role, also the set of roles allowed to hold a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

// SQLx conversion for Role (stored as TEXT)
impl sqlx::Type<Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <String as Encode<Postgres>>::encode(self.as_str().to_string(), buf)
    }
}

/// Internal row structure for user queries
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl UserRow {
    pub fn with_books(self, books: Vec<Book>) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            role: self.role,
            books,
        }
    }
}

/// User with the books currently held
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub books: Vec<Book>,
}

/// Login lookup row; the only place the password hash leaves the database
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: i32,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Register request (self-service, always role `user`)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUser {
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(custom(function = "not_blank"))]
    pub password: String,
}

/// Create user request (admin)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(custom(function = "not_blank"))]
    pub password: String,
    pub role: Option<Role>,
}

impl From<RegisterUser> for CreateUser {
    fn from(user: RegisterUser) -> Self {
        Self {
            name: user.name,
            email: user.email,
            password: user.password,
            role: Some(Role::User),
        }
    }
}

/// Update user request
#[derive(Debug, Clone, PartialEq, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[validate(range(min = 1, message = "Invalid user id"))]
    pub id: i32,
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    /// Only administrators may change roles
    pub role: Option<Role>,
}

/// User insert, with the password already hashed
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(custom(function = "not_blank"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    /// Always `Bearer`
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Session details returned by check-auth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SessionInfo {
    pub subject: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl From<&UserClaims> for SessionInfo {
    fn from(claims: &UserClaims) -> Self {
        Self {
            subject: claims.sub.clone(),
            role: claims.role,
            expires_at: claims.expires_at(),
        }
    }
}

/// Token payload as signed, before the role is checked
#[derive(Debug, Deserialize)]
struct SignedClaims {
    sub: String,
    role: String,
    exp: i64,
    iat: i64,
}

/// JWT claims for authenticated users
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserClaims {
    /// User email
    pub sub: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token; expiry is checked without leeway.
    ///
    /// A bad signature, a malformed token or an expired one is an
    /// `Authentication` error. A genuine token carrying a role outside
    /// [`Role`] is an `Authorization` error.
    pub fn from_token(token: &str, secret: &str) -> Result<Self, AppError> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let mut validation = Validation::default();
        validation.leeway = 0;
        let signed = decode::<SignedClaims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!(error = %e, "Rejected session token");
            AppError::Authentication("Invalid token".to_string())
        })?
        .claims;

        let role = signed.role.parse::<Role>().map_err(|_| {
            AppError::Authorization(format!("Role {} may not open a session", signed.role))
        })?;

        Ok(Self {
            sub: signed.sub,
            role,
            exp: signed.exp,
            iat: signed.iat,
        })
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_default()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }

    /// Require the session to belong to `email`, unless it is an admin session
    pub fn require_self_or_admin(&self, email: &str) -> Result<(), AppError> {
        if self.is_admin() || self.sub.eq_ignore_ascii_case(email) {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Users may only act on their own account".to_string(),
            ))
        }
    }
}
