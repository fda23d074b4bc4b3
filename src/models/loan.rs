//! Loan (user-book association) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Loan row; open while `return_date` is empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub user_id: i32,
    pub book_id: i32,
    pub taken_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }
}

/// Take / return request
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoanRequest {
    #[validate(range(min = 1, message = "Invalid user id"))]
    pub user_id: i32,
    #[validate(range(min = 1, message = "Invalid book id"))]
    pub book_id: i32,
}
