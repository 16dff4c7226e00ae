use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    api::{extract::{Json, Path}, middleware::auth::CurrentUser, state::AppState},
    domain::{Book, BookFilter, CreateBookRequest, UpdateBookRequest},
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    rating: Option<i32>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<BookFilter>,
) -> Result<Json<Vec<Book>>> {
    let books = state.service_context.book_service.list(&filter).await?;
    Ok(Json(books))
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Book>>> {
    let books = state.service_context.book_service.search(params.query).await?;
    Ok(Json(books))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Book>> {
    let book = state.service_context.book_service.get(id).await?;
    Ok(Json(book))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<Book>)> {
    let book = state.service_context.book_service.create(req, current.user.id).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBookRequest>,
) -> Result<Json<Book>> {
    let book = state.service_context.book_service.update(id, req).await?;
    Ok(Json(book))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    state.service_context.book_service.delete(id).await?;
    Ok(Json(json!({ "message": "Book removed" })))
}

pub async fn rate(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<RateRequest>,
) -> Result<Json<Book>> {
    let book = state
        .service_context
        .book_service
        .rate(id, current.user.id, req.rating)
        .await?;
    Ok(Json(book))
}
