use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{
        average_rating, AddedBy, Book, BookFilter, CreateBookRequest, Rating, UpdateBookRequest,
        DEFAULT_COVER_IMAGE,
    },
    error::{AppError, Result},
    repository::BookRepository,
};

#[derive(FromRow)]
struct BookRow {
    id: String,
    title: String,
    author: String,
    isbn: Option<String>,
    cover_image: String,
    description: Option<String>,
    category: Option<String>,
    availability: i32,
    added_by: Option<String>,
    added_by_username: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct RatingRow {
    book_id: String,
    user_id: String,
    rating: i32,
}

const SELECT_BOOKS: &str = r#"
    SELECT b.id, b.title, b.author, b.isbn, b.cover_image, b.description,
           b.category, b.availability, b.added_by, u.username AS added_by_username,
           b.created_at, b.updated_at
    FROM books b
    LEFT JOIN users u ON u.id = b.added_by
"#;

pub struct SqliteBookRepository {
    pool: SqlitePool,
}

impl SqliteBookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_book(row: BookRow, ratings: Vec<Rating>) -> Result<Book> {
        let added_by = match (row.added_by, row.added_by_username) {
            (Some(id), Some(username)) => Some(AddedBy {
                id: Uuid::parse_str(&id).map_err(|e| AppError::Database(e.to_string()))?,
                username,
            }),
            _ => None,
        };

        Ok(Book {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            title: row.title,
            author: row.author,
            isbn: row.isbn,
            cover_image: row.cover_image,
            description: row.description,
            category: row.category,
            availability: row.availability != 0,
            average_rating: average_rating(&ratings),
            ratings,
            added_by,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn row_to_rating(row: &RatingRow) -> Result<Rating> {
        Ok(Rating {
            user_id: Uuid::parse_str(&row.user_id).map_err(|e| AppError::Database(e.to_string()))?,
            rating: row.rating,
        })
    }

    async fn ratings_for(&self, book_id: &str) -> Result<Vec<Rating>> {
        let rows = sqlx::query_as::<_, RatingRow>(
            "SELECT book_id, user_id, rating FROM book_ratings WHERE book_id = ? ORDER BY created_at",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_rating).collect()
    }

    async fn all_ratings(&self) -> Result<HashMap<String, Vec<Rating>>> {
        let rows = sqlx::query_as::<_, RatingRow>(
            "SELECT book_id, user_id, rating FROM book_ratings ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_book: HashMap<String, Vec<Rating>> = HashMap::new();
        for row in &rows {
            by_book
                .entry(row.book_id.clone())
                .or_default()
                .push(Self::row_to_rating(row)?);
        }
        Ok(by_book)
    }
}

/// `%term%` with LIKE wildcards escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl BookRepository for SqliteBookRepository {
    async fn create(&self, book: CreateBookRequest, added_by: Uuid) -> Result<Book> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let cover_image = book
            .cover_image
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_COVER_IMAGE.to_string());

        sqlx::query(
            r#"
            INSERT INTO books (
                id, title, author, isbn, cover_image, description, category,
                availability, added_by, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(book.title.trim())
        .bind(book.author.trim())
        .bind(book.isbn.as_deref().map(str::trim))
        .bind(&cover_image)
        .bind(book.description.as_deref().map(str::trim))
        .bind(book.category.as_deref().map(str::trim))
        .bind(added_by.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created book".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>> {
        let id_str = id.to_string();
        let row = sqlx::query_as::<_, BookRow>(&format!("{} WHERE b.id = ?", SELECT_BOOKS))
            .bind(&id_str)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let ratings = self.ratings_for(&id_str).await?;
                Ok(Some(Self::row_to_book(r, ratings)?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &BookFilter) -> Result<Vec<Book>> {
        let query = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty());
        let category = filter.category.as_deref().map(str::trim).filter(|c| !c.is_empty());

        // SQLite LIKE is case-insensitive for ASCII
        let sql = format!(
            r#"{}
            WHERE (?1 IS NULL
                   OR b.title LIKE ?1 ESCAPE '\'
                   OR b.author LIKE ?1 ESCAPE '\'
                   OR b.category LIKE ?1 ESCAPE '\'
                   OR b.isbn LIKE ?1 ESCAPE '\')
              AND (?2 IS NULL OR b.category LIKE ?2 ESCAPE '\')
            ORDER BY b.created_at DESC
            "#,
            SELECT_BOOKS
        );

        let rows = sqlx::query_as::<_, BookRow>(&sql)
            .bind(query.map(like_pattern))
            .bind(category.map(like_pattern))
            .fetch_all(&self.pool)
            .await?;

        let mut ratings = self.all_ratings().await?;
        rows.into_iter()
            .map(|row| {
                let book_ratings = ratings.remove(&row.id).unwrap_or_default();
                Self::row_to_book(row, book_ratings)
            })
            .collect()
    }

    async fn update(&self, id: Uuid, update: UpdateBookRequest) -> Result<Book> {
        let now = Utc::now().naive_utc();
        // Blank strings keep the current value
        let keep_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty()).map(|s| s.trim().to_string());
        let availability = update.availability.map(|a| if a { 1i32 } else { 0i32 });

        let result = sqlx::query(
            r#"
            UPDATE books
            SET title = COALESCE(?, title),
                author = COALESCE(?, author),
                isbn = COALESCE(?, isbn),
                cover_image = COALESCE(?, cover_image),
                description = COALESCE(?, description),
                category = COALESCE(?, category),
                availability = COALESCE(?, availability),
                updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(keep_blank(update.title))
        .bind(keep_blank(update.author))
        .bind(keep_blank(update.isbn))
        .bind(keep_blank(update.cover_image))
        .bind(keep_blank(update.description))
        .bind(keep_blank(update.category))
        .bind(availability)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Book not found".to_string()));
        }

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated book".to_string())
        })
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn claim_copy(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE books SET availability = 0, updated_at = ? WHERE id = ? AND availability = 1",
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn release_copy(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE books SET availability = 1, updated_at = ? WHERE id = ?")
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn upsert_rating(&self, book_id: Uuid, user_id: Uuid, rating: i32) -> Result<()> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO book_ratings (book_id, user_id, rating, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(book_id, user_id) DO UPDATE SET
                rating = excluded.rating,
                updated_at = excluded.updated_at
            "#
        )
        .bind(book_id.to_string())
        .bind(user_id.to_string())
        .bind(rating)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
