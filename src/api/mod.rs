//! API handlers for Libris REST endpoints

pub mod auth;
pub mod books;
pub mod health;
pub mod loans;
pub mod middleware;
pub mod openapi;
pub mod users;


use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Verified session of the caller, placed in the request by
/// [`middleware::authorize`]
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserClaims>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or_else(|| AppError::Authentication("Missing session".to_string()))
    }
}

/// JSON body extractor whose rejections become [`AppError::BadRequest`]
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Path extractor whose rejections become [`AppError::BadRequest`]
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// Build the application router with every route and layer
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected = Router::new()
        .route("/auth/check-auth", post(auth::check_auth))
        // Users
        .route("/users", get(users::list_users))
        .route("/users/add", post(users::create_user))
        .route("/users/update", patch(users::update_user))
        .route("/users/take", post(loans::take_book))
        .route("/users/return", post(loans::return_book))
        .route("/users/:id", get(users::get_user).delete(users::delete_user))
        // Books
        .route("/books", get(books::list_books))
        .route("/books/add", post(books::create_book))
        .route("/books/update", patch(books::update_book))
        .route("/books/:id", get(books::get_book).delete(books::delete_book))
        .route_layer(from_fn_with_state(state.clone(), middleware::authorize));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(state)
        .merge(openapi::create_openapi_router())
        .layer(from_fn(middleware::error_envelope))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
