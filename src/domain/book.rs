use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_COVER_IMAGE: &str = "https://via.placeholder.com/300x400?text=No+Cover";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub cover_image: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub availability: bool,
    pub ratings: Vec<Rating>,
    pub average_rating: f64,
    pub added_by: Option<AddedBy>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub user_id: Uuid,
    pub rating: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddedBy {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub cover_image: String,
    pub category: Option<String>,
}

/// Mean of the current ratings, zero for an unrated book.
pub fn average_rating(ratings: &[Rating]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i64 = ratings.iter().map(|r| r.rating as i64).sum();
    sum as f64 / ratings.len() as f64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub isbn: Option<String>,
    pub cover_image: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub cover_image: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub availability: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookFilter {
    pub query: Option<String>,
    pub category: Option<String>,
}

/// Whether issuing a title consumes its only copy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CopyPolicy {
    #[default]
    Unlimited,
    SingleCopy,
}
