//! In-memory store used as a test double for the PostgreSQL repository.
//!
//! Mirrors the database constraints the services rely on: unique e-mails,
//! one open loan per book, and the take / return state transitions.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::{BookStore, LoanStore, Store, UserStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, CreateBook, UpdateBook},
        loan::Loan,
        user::{NewUser, Role, UpdateUser, User, UserCredentials},
    },
};

#[derive(Debug, Clone)]
struct StoredUser {
    name: String,
    email: String,
    password: String,
    role: Role,
}

#[derive(Debug, Default)]
struct State {
    next_user_id: i32,
    next_book_id: i32,
    users: BTreeMap<i32, StoredUser>,
    books: BTreeMap<i32, Book>,
    loans: Vec<Loan>,
}

impl State {
    fn held_books(&self, user_id: i32) -> Vec<Book> {
        self.loans
            .iter()
            .filter(|l| l.user_id == user_id && l.is_open())
            .filter_map(|l| self.books.get(&l.book_id).cloned())
            .collect()
    }

    fn user(&self, id: i32) -> AppResult<User> {
        let stored = self
            .users
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;
        Ok(User {
            id,
            name: stored.name.clone(),
            email: stored.email.clone(),
            role: stored.role,
            books: self.held_books(id),
        })
    }

    fn email_taken(&self, email: &str, exclude_id: Option<i32>) -> bool {
        self.users
            .iter()
            .any(|(id, u)| Some(*id) != exclude_id && u.email.eq_ignore_ascii_case(email))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every loan row, open or closed
    pub fn loans(&self) -> Vec<Loan> {
        self.state().loans.clone()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn list_users(&self) -> AppResult<Vec<User>> {
        let state = self.state();
        state.users.keys().map(|id| state.user(*id)).collect()
    }

    async fn get_user(&self, id: i32) -> AppResult<User> {
        self.state().user(id)
    }

    async fn find_credentials(&self, email: &str) -> AppResult<Option<UserCredentials>> {
        let state = self.state();
        Ok(state
            .users
            .iter()
            .find(|(_, u)| u.email.eq_ignore_ascii_case(email))
            .map(|(id, u)| UserCredentials {
                id: *id,
                email: u.email.clone(),
                password: u.password.clone(),
                role: u.role,
            }))
    }

    async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        Ok(self.state().email_taken(email, exclude_id))
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut state = self.state();
        if state.email_taken(&user.email, None) {
            return Err(AppError::Conflict("Record already exists".to_string()));
        }
        state.next_user_id += 1;
        let id = state.next_user_id;
        state.users.insert(
            id,
            StoredUser {
                name: user.name,
                email: user.email,
                password: user.password_hash,
                role: user.role,
            },
        );
        state.user(id)
    }

    async fn update_user(&self, user: UpdateUser) -> AppResult<User> {
        let mut state = self.state();
        if state.email_taken(&user.email, Some(user.id)) {
            return Err(AppError::Conflict("Record already exists".to_string()));
        }
        let stored = state
            .users
            .get_mut(&user.id)
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user.id)))?;
        stored.name = user.name;
        stored.email = user.email;
        if let Some(role) = user.role {
            stored.role = role;
        }
        state.user(user.id)
    }

    async fn delete_user(&self, id: i32) -> AppResult<()> {
        let mut state = self.state();
        if !state.users.contains_key(&id) {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }
        if state.loans.iter().any(|l| l.user_id == id && l.is_open()) {
            return Err(AppError::Conflict(format!("User {} still holds books", id)));
        }
        state.loans.retain(|l| l.user_id != id);
        state.users.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn list_books(&self) -> AppResult<Vec<Book>> {
        Ok(self.state().books.values().cloned().collect())
    }

    async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.state()
            .books
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        let mut state = self.state();
        state.next_book_id += 1;
        let book = Book {
            id: state.next_book_id,
            title: book.title,
            author: book.author,
            available: true,
        };
        state.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn update_book(&self, book: UpdateBook) -> AppResult<Book> {
        let mut state = self.state();
        let stored = state
            .books
            .get_mut(&book.id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book.id)))?;
        stored.title = book.title;
        stored.author = book.author;
        Ok(stored.clone())
    }

    async fn delete_book(&self, id: i32) -> AppResult<()> {
        let mut state = self.state();
        match state.books.get(&id) {
            None => return Err(AppError::NotFound(format!("Book with id {} not found", id))),
            Some(book) if !book.available => {
                return Err(AppError::Conflict(format!("Book {} is on loan", id)))
            }
            Some(_) => {}
        }
        state.loans.retain(|l| l.book_id != id);
        state.books.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl LoanStore for MemoryStore {
    async fn take_book(&self, user_id: i32, book_id: i32) -> AppResult<Loan> {
        let mut state = self.state();
        if !state.users.contains_key(&user_id) {
            return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
        }
        let book = state
            .books
            .get_mut(&book_id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;
        if !book.available {
            return Err(AppError::Conflict(format!("Book {} is not available", book_id)));
        }
        book.available = false;

        let loan = Loan {
            user_id,
            book_id,
            taken_date: Utc::now(),
            return_date: None,
        };
        state
            .loans
            .retain(|l| !(l.user_id == user_id && l.book_id == book_id));
        state.loans.push(loan.clone());
        Ok(loan)
    }

    async fn return_book(&self, user_id: i32, book_id: i32) -> AppResult<Loan> {
        let mut state = self.state();
        let loan = state
            .loans
            .iter_mut()
            .find(|l| l.user_id == user_id && l.book_id == book_id && l.is_open())
            .ok_or_else(|| {
                AppError::Conflict(format!("Book {} is not held by user {}", book_id, user_id))
            })?;
        loan.return_date = Some(Utc::now());
        let loan = loan.clone();

        if let Some(book) = state.books.get_mut(&book_id) {
            book.available = true;
        }
        Ok(loan)
    }

    async fn book_holder(&self, book_id: i32) -> AppResult<Option<i32>> {
        Ok(self
            .state()
            .loans
            .iter()
            .find(|l| l.book_id == book_id && l.is_open())
            .map(|l| l.user_id))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
