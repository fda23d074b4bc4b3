//! Take / return coordination

use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{loan::Loan, user::UserClaims},
    repository::{LoanStore, Store, UserStore},
};

#[derive(Clone)]
pub struct LendingService {
    store: Arc<dyn Store>,
}

impl LendingService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Lend a book to a user. Fails with `Conflict` when the book is out.
    pub async fn take(&self, claims: &UserClaims, user_id: i32, book_id: i32) -> AppResult<Loan> {
        let user = self.store.get_user(user_id).await?;
        claims.require_self_or_admin(&user.email)?;

        self.store.take_book(user_id, book_id).await
    }

    /// Close the user's open loan on a book. Fails with `Conflict` when the
    /// user does not hold it.
    pub async fn return_book(
        &self,
        claims: &UserClaims,
        user_id: i32,
        book_id: i32,
    ) -> AppResult<Loan> {
        let user = self.store.get_user(user_id).await?;
        claims.require_self_or_admin(&user.email)?;

        self.store.return_book(user_id, book_id).await
    }
}
