//! Data models for Libris

pub mod book;
pub mod loan;
pub mod user;
pub mod validation;

// Re-export commonly used types
pub use book::{Book, CreateBook, UpdateBook};
pub use loan::{Loan, LoanRequest};
pub use user::{
    CreateUser, LoginRequest, LoginResponse, NewUser, RegisterUser, Role, SessionInfo, UpdateUser,
    User, UserClaims,
};
