//! Request middleware: session gate and error envelope

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};

use crate::{
    error::{AppError, ErrorReport, ErrorResponse},
    AppState,
};

/// Require a valid bearer token with a session role.
///
/// A missing or invalid token is rejected with 401, a genuine token whose
/// role may not hold a session with 403. On success the verified [`UserClaims`](crate::models::user::UserClaims)
/// are stored in the request extensions for
/// [`AuthenticatedUser`](super::AuthenticatedUser).
pub async fn authorize(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Authentication("Missing or malformed bearer token".to_string()))?;

    let claims = state.services.credentials.parse_token(bearer.token())?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Render [`ErrorReport`]s left by failed handlers as [`ErrorResponse`] bodies
pub async fn error_envelope(matched: Option<MatchedPath>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let route = matched
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let mut response = next.run(request).await;
    let Some(report) = response.extensions_mut().remove::<ErrorReport>() else {
        return response;
    };

    let status = response.status();
    let body = ErrorResponse::new(report.message, format!("{} {}", method, route));

    if status.is_server_error() {
        tracing::error!(
            error_id = %body.error_id,
            method = %body.method,
            status = status.as_u16(),
            detail = %report.detail,
            "Request failed"
        );
    } else {
        tracing::warn!(
            error_id = %body.error_id,
            method = %body.method,
            status = status.as_u16(),
            detail = %report.detail,
            "Request rejected"
        );
    }

    (status, Json(body)).into_response()
}
