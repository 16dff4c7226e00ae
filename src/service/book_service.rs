use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::*,
    error::{AppError, Result},
    repository::BookRepository,
};

pub struct BookService {
    repo: Arc<dyn BookRepository>,
}

impl BookService {
    pub fn new(repo: Arc<dyn BookRepository>) -> Self {
        Self { repo }
    }

    /// List the catalog, newest first, optionally filtered
    pub async fn list(&self, filter: &BookFilter) -> Result<Vec<Book>> {
        self.repo.list(filter).await
    }

    /// Free-text search; unlike `list` the query is mandatory
    pub async fn search(&self, query: Option<String>) -> Result<Vec<Book>> {
        let query = query
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("Please provide a search query".to_string()))?;

        self.repo
            .list(&BookFilter { query: Some(query), category: None })
            .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Book> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    pub async fn create(&self, request: CreateBookRequest, added_by: Uuid) -> Result<Book> {
        if request.title.trim().is_empty() || request.author.trim().is_empty() {
            return Err(AppError::BadRequest("Please provide title and author".to_string()));
        }

        let book = self.repo.create(request, added_by).await?;
        tracing::info!(book_id = %book.id, title = %book.title, "book added");
        Ok(book)
    }

    pub async fn update(&self, id: Uuid, request: UpdateBookRequest) -> Result<Book> {
        self.repo.update(id, request).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.repo.delete(id).await? {
            return Err(AppError::NotFound("Book not found".to_string()));
        }
        tracing::info!(book_id = %id, "book removed");
        Ok(())
    }

    /// Records `user_id`'s rating, replacing any earlier one
    pub async fn rate(&self, id: Uuid, user_id: Uuid, rating: Option<i32>) -> Result<Book> {
        let rating = rating
            .filter(|r| (1..=5).contains(r))
            .ok_or_else(|| AppError::Validation("Please provide a valid rating (1-5)".to_string()))?;

        // Existence check first so a missing book is a 404, not a constraint error
        self.get(id).await?;
        self.repo.upsert_rating(id, user_id, rating).await?;
        self.get(id).await
    }
}
