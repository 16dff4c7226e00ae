#![allow(dead_code)]

use bibliotheca::{
    config::Settings,
    domain::{Book, CreateBookRequest, RegisterRequest},
    service::{user_service::AuthResponse, ServiceContext},
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

/// Fresh in-memory database with the schema applied.
///
/// One connection only: every new connection to `sqlite::memory:` would be
/// a separate, empty database.
pub async fn test_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Defaults, except that simulated card/upi payments always settle.
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.auth.jwt_secret = "test-secret".to_string();
    settings.payments.success_rate = 1.0;
    settings
}

pub async fn test_context() -> anyhow::Result<ServiceContext> {
    Ok(ServiceContext::sqlite(test_pool().await?, &test_settings()))
}

pub fn register_request(username: &str, role: Option<&str>, payment_method: Option<&str>) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password: "password123".to_string(),
        role: role.map(str::to_string),
        payment_method: payment_method.map(str::to_string),
        payment_details: None,
    }
}

pub async fn register_admin(ctx: &ServiceContext, username: &str) -> anyhow::Result<AuthResponse> {
    Ok(ctx
        .user_service
        .register(register_request(username, Some("admin"), None))
        .await?)
}

pub async fn register_member(ctx: &ServiceContext, username: &str) -> anyhow::Result<AuthResponse> {
    Ok(ctx
        .user_service
        .register(register_request(username, None, Some("cash")))
        .await?)
}

pub fn book_request(title: &str, author: &str, category: Option<&str>) -> CreateBookRequest {
    CreateBookRequest {
        title: title.to_string(),
        author: author.to_string(),
        isbn: None,
        cover_image: None,
        description: None,
        category: category.map(str::to_string),
    }
}

pub async fn add_book(ctx: &ServiceContext, admin: &AuthResponse, title: &str) -> anyhow::Result<Book> {
    Ok(ctx
        .book_service
        .create(book_request(title, "Ursula K. Le Guin", Some("Fiction")), admin.id)
        .await?)
}
