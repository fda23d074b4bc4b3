//! Authentication endpoints

use axum::{
    extract::State,
    http::{
        header::{HeaderName, AUTHORIZATION},
        HeaderMap, HeaderValue, StatusCode,
    },
    Json,
};

use crate::{
    error::{AppError, AppResult},
    models::user::{LoginRequest, LoginResponse, RegisterUser, SessionInfo, User},
    AppState,
};

use super::{AppJson, AuthenticatedUser};

/// Register a new account
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterUser,
    responses(
        (status = 201, description = "Account created", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    AppJson(user): AppJson<RegisterUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    let created = state.services.auth.register(user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Login with email and password.
///
/// The token is also returned in the `Authorization` header, and the role in
/// the `role` header.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    let response = state.services.auth.login(request).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", response.token))
            .map_err(|e| AppError::Internal(format!("Unusable token header: {}", e)))?,
    );
    headers.insert(
        HeaderName::from_static("role"),
        HeaderValue::from_static(response.user.role.as_str()),
    );

    Ok((headers, Json(response)))
}

/// Check the current session
#[utoipa::path(
    post,
    path = "/auth/check-auth",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Session is valid", body = SessionInfo),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn check_auth(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> Json<SessionInfo> {
    Json(state.services.auth.check(&claims))
}
