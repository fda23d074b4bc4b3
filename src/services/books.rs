//! Book catalog service

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::AppResult,
    models::book::{Book, CreateBook, UpdateBook},
    repository::{BookStore, Store},
};

#[derive(Clone)]
pub struct BooksService {
    store: Arc<dyn Store>,
}

impl BooksService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> AppResult<Vec<Book>> {
        self.store.list_books().await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        self.store.get_book(id).await
    }

    pub async fn create(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;
        let created = self
            .store
            .create_book(CreateBook {
                title: book.title.trim().to_string(),
                author: book.author.trim().to_string(),
            })
            .await?;
        tracing::info!(book_id = created.id, "Book created");
        Ok(created)
    }

    pub async fn update(&self, book: UpdateBook) -> AppResult<Book> {
        book.validate()?;
        let updated = self
            .store
            .update_book(UpdateBook {
                id: book.id,
                title: book.title.trim().to_string(),
                author: book.author.trim().to_string(),
            })
            .await?;
        tracing::info!(book_id = updated.id, "Book updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.store.delete_book(id).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }
}
