//! Take / return endpoints

use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    error::AppResult,
    models::loan::{Loan, LoanRequest},
    AppState,
};

use super::{AppJson, AuthenticatedUser};

/// Borrow a book
#[utoipa::path(
    post,
    path = "/users/take",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = LoanRequest,
    responses(
        (status = 200, description = "Loan opened", body = Loan),
        (status = 404, description = "User or book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book is not available", body = crate::error::ErrorResponse)
    )
)]
pub async fn take_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(request): AppJson<LoanRequest>,
) -> AppResult<Json<Loan>> {
    request.validate()?;

    let loan = state
        .services
        .lending
        .take(&claims, request.user_id, request.book_id)
        .await?;
    Ok(Json(loan))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/users/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = LoanRequest,
    responses(
        (status = 200, description = "Loan closed", body = Loan),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book is not held by this user", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(request): AppJson<LoanRequest>,
) -> AppResult<Json<Loan>> {
    request.validate()?;

    let loan = state
        .services
        .lending
        .return_book(&claims, request.user_id, request.book_id)
        .await?;
    Ok(Json(loan))
}
