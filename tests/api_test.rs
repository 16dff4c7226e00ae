mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::get,
    Json, Router,
};
use bibliotheca::{
    api::{create_app, middleware::errors::expose_error_details},
    error::{AppError, Result as AppResult},
    service::ServiceContext,
};
use chrono::{Duration, Utc};
use common::*;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_app() -> anyhow::Result<(Router, Arc<ServiceContext>)> {
    let settings = test_settings();
    let ctx = Arc::new(ServiceContext::sqlite(test_pool().await?, &settings));
    Ok((create_app(ctx.clone(), Arc::new(settings)), ctx))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> anyhow::Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };

    Ok((status, value))
}

async fn register(app: &Router, username: &str, role: Option<&str>) -> anyhow::Result<Value> {
    let mut body = json!({
        "username": username,
        "email": format!("{}@example.com", username),
        "password": "password123",
        "paymentMethod": "upi",
        "paymentDetails": { "upiId": format!("{}@bank", username) }
    });
    if let Some(role) = role {
        body["role"] = json!(role);
    }

    let (status, value) = send(app, "POST", "/auth/register", None, Some(body)).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", value);
    Ok(value)
}

fn token(auth: &Value) -> &str {
    auth["token"].as_str().unwrap()
}

#[tokio::test]
async fn test_health_and_root() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;

    let (status, body) = send(&app, "GET", "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());

    let (status, body) = send(&app, "GET", "/", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"]["books"], "/books");

    Ok(())
}

#[tokio::test]
async fn test_register_login_and_me() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;

    let member = register(&app, "reader", None).await?;
    assert_eq!(member["role"], "member");
    assert!(member["payment"]["reference"].as_str().unwrap().starts_with("MEMBER-"));

    let (status, body) = send(&app, "POST", "/auth/register", None, Some(json!({ "email": "x@example.com" }))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide all required fields");
    assert!(body.get("error").is_none());

    let (status, body) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "reader@example.com", "password": "password123" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let login_token = body["token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "reader@example.com", "password": "nope-nope" })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");

    let (status, body) = send(&app, "GET", "/auth/me", Some(&login_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "reader");
    assert!(body.get("password").is_none());
    assert!(body.get("passwordHash").is_none());

    let (status, _) = send(&app, "GET", "/auth/me", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/auth/me", Some("not.a.token"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_second_admin_is_bad_request() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;
    register(&app, "librarian", Some("admin")).await?;

    let (status, body) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "username": "usurper",
            "email": "usurper@example.com",
            "password": "password123",
            "role": "admin",
            "paymentMethod": "cash"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Admin user already exists. Only one admin account is allowed.");

    Ok(())
}

#[tokio::test]
async fn test_catalog_permissions_and_search() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;
    let admin = register(&app, "librarian", Some("admin")).await?;
    let member = register(&app, "reader", None).await?;

    let new_book = json!({ "title": "Kindred", "author": "Octavia E. Butler", "category": "Fiction" });

    let (status, _) = send(&app, "POST", "/books", None, Some(new_book.clone())).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, "POST", "/books", Some(token(&member)), Some(new_book.clone())).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Not authorized as an admin");

    let (status, book) = send(&app, "POST", "/books", Some(token(&admin)), Some(new_book)).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(book["availability"], true);
    assert_eq!(book["averageRating"], 0.0);
    let book_id = book["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/admin/books",
        Some(token(&admin)),
        Some(json!({ "title": "Parable of the Sower" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide title and author");

    let (status, books) = send(&app, "GET", "/books?query=BUTLER", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(books.as_array().map(Vec::len), Some(1));

    let (status, books) = send(&app, "GET", "/books?category=poetry", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(books.as_array().map(Vec::len), Some(0));

    let (status, _) = send(&app, "GET", "/books/search", None, None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, books) = send(&app, "GET", "/books/search?query=kind", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(books[0]["id"], book_id.as_str());

    let (status, book) = send(
        &app,
        "PUT",
        &format!("/books/{}/rate", book_id),
        Some(token(&member)),
        Some(json!({ "rating": 5 })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["averageRating"], 5.0);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/books/{}/rate", book_id),
        Some(token(&member)),
        Some(json!({ "rating": 0 })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide a valid rating (1-5)");

    let (status, book) = send(
        &app,
        "PUT",
        &format!("/admin/books/{}", book_id),
        Some(token(&admin)),
        Some(json!({ "description": "Time travel to antebellum Maryland" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["title"], "Kindred");

    let (status, body) = send(&app, "DELETE", &format!("/books/{}", book_id), Some(token(&admin)), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Book removed");

    let (status, body) = send(&app, "GET", &format!("/books/{}", book_id), None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Book not found");

    Ok(())
}

#[tokio::test]
async fn test_issue_return_and_fines_over_http() -> anyhow::Result<()> {
    let (app, ctx) = test_app().await?;
    let admin = register(&app, "librarian", Some("admin")).await?;
    let owner = register(&app, "owner", None).await?;
    let other = register(&app, "other", None).await?;

    let (_, book) = send(
        &app,
        "POST",
        "/books",
        Some(token(&admin)),
        Some(json!({ "title": "Beloved", "author": "Toni Morrison" })),
    )
    .await?;
    let book_id = book["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "POST", "/member/issue", Some(token(&owner)), Some(json!({}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide book ID");

    let (status, body) = send(
        &app,
        "POST",
        "/member/issue",
        Some(token(&owner)),
        Some(json!({ "bookId": book_id })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["issue"]["status"], "issued");

    let (status, body) = send(
        &app,
        "POST",
        "/member/issue",
        Some(token(&owner)),
        Some(json!({ "bookId": book_id })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You already have this book issued");

    // A loan from long ago, opened directly so its dates are in the past
    let owner_id = uuid::Uuid::parse_str(owner["id"].as_str().unwrap())?;
    let admin_id = uuid::Uuid::parse_str(admin["id"].as_str().unwrap())?;
    let second_book = ctx
        .book_service
        .create(book_request("Jazz", "Toni Morrison", None), admin_id)
        .await?;
    let old_issue = ctx
        .issue_service
        .issue_book_at(owner_id, second_book.id, Utc::now() - Duration::days(14))
        .await?;

    let (status, dashboard) = send(&app, "GET", "/admin/dashboard", Some(token(&admin)), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["stats"]["pendingFinesCount"], 1);
    assert_eq!(dashboard["stats"]["totalIssuedBooks"], 2);

    let (status, _) = send(&app, "GET", "/admin/dashboard", Some(token(&owner)), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, fines) = send(&app, "GET", "/member/fines", Some(token(&owner)), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fines["fines"].as_array().map(Vec::len), Some(1));
    assert!(fines["totalPending"].as_i64().unwrap() >= 40);
    let fine_id = fines["fines"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(fines["fines"][0]["issueId"], old_issue.id.to_string());

    let (status, body) = send(&app, "POST", &format!("/member/fines/{}/pay", fine_id), Some(token(&other)), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Access denied");

    let (status, _) = send(&app, "GET", &format!("/fines/{}", fine_id), Some(token(&other)), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "POST", &format!("/member/fines/{}/pay", fine_id), Some(token(&owner)), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fine"]["status"], "paid");
    assert!(body["fine"]["paidAt"].is_string());

    let (status, body) = send(&app, "POST", &format!("/member/fines/{}/pay", fine_id), Some(token(&owner)), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Fine already paid");

    let (status, _) = send(&app, "PUT", &format!("/fines/{}/pay", fine_id), Some(token(&owner)), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "POST",
        "/member/return",
        Some(token(&owner)),
        Some(json!({ "bookId": book_id })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["issue"]["status"], "returned");
    assert!(body["fine"].is_null());

    let (status, body) = send(
        &app,
        "POST",
        "/member/return",
        Some(token(&owner)),
        Some(json!({ "bookId": book_id })),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No active issue found for this book");

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/admin/issues/{}/return", old_issue.id),
        Some(token(&admin)),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Book marked as returned");
    assert_eq!(body["fine"]["status"], "paid");

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/admin/issues/{}/return", old_issue.id),
        Some(token(&admin)),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Book already returned");

    let (status, issues) = send(&app, "GET", "/member/issues", Some(token(&owner)), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(issues.as_array().map(Vec::len), Some(2));
    assert_eq!(issues[0]["user"]["username"], "owner");

    let (status, issues) = send(&app, "GET", "/admin/issues", Some(token(&admin)), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(issues.as_array().map(Vec::len), Some(2));

    let (status, fines) = send(&app, "GET", "/fines", Some(token(&other)), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fines.as_array().map(Vec::len), Some(0));

    Ok(())
}

#[tokio::test]
async fn test_admin_user_management() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;
    let admin = register(&app, "librarian", Some("admin")).await?;
    let member = register(&app, "reader", None).await?;
    let member_id = member["id"].as_str().unwrap();

    let (status, users) = send(&app, "GET", "/admin/users", Some(token(&admin)), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().map(Vec::len), Some(2));

    let (status, _) = send(&app, "GET", "/admin/users", Some(token(&member)), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/admin/users/{}/role", member_id),
        Some(token(&admin)),
        Some(json!({ "role": "superuser" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid role. Must be admin or member");

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/admin/users/{}/role", member_id),
        Some(token(&admin)),
        Some(json!({ "role": "admin" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "admin");

    // The promoted account now passes the admin gate with its old token
    let (status, _) = send(&app, "GET", "/admin/users", Some(token(&member)), None).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_payment_endpoints() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;
    let member = register(&app, "reader", None).await?;
    let other = register(&app, "other", None).await?;
    let member_id = member["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        "/payment/process",
        Some(token(&member)),
        Some(json!({ "amount": 0, "paymentMethod": "cash" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide a valid amount");

    let (status, body) = send(
        &app,
        "POST",
        "/payment/process",
        Some(token(&member)),
        Some(json!({ "amount": 75, "paymentMethod": "cheque" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide a valid payment method (upi, cash, or card)");

    let (status, body) = send(
        &app,
        "POST",
        "/payment/process",
        Some(token(&member)),
        Some(json!({ "amount": 75, "paymentMethod": "card", "paymentDetails": { "cardLast4": "1881" } })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let payment = &body["payment"];
    assert_eq!(payment["status"], "success");
    assert_eq!(payment["description"], "Library service payment");
    assert_eq!(payment["paymentDetails"]["cardLast4"], "1881");
    let reference = payment["reference"].as_str().unwrap().to_string();
    assert!(reference.starts_with("PAY-"));

    let (status, body) = send(&app, "GET", &format!("/payment/status/{}", reference), Some(token(&member)), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"], 75);

    let (status, _) = send(&app, "GET", &format!("/payment/status/{}", reference), Some(token(&other)), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, history) = send(&app, "GET", &format!("/payment/history/{}", member_id), Some(token(&member)), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().map(Vec::len), Some(2));

    let (status, body) = send(&app, "GET", &format!("/payment/history/{}", member_id), Some(token(&other)), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Access denied");

    let (status, body) = send(&app, "POST", "/payment/verify", Some(token(&member)), Some(json!({}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide a payment reference");

    let (status, body) = send(
        &app,
        "POST",
        "/payment/verify",
        Some(token(&member)),
        Some(json!({ "reference": reference })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], true);
    assert_eq!(body["status"], "success");

    Ok(())
}

#[tokio::test]
async fn test_malformed_requests_get_json_errors() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;
    let admin = register(&app, "librarian", Some("admin")).await?;
    let member = register(&app, "reader", None).await?;

    let (status, body) = send(&app, "GET", "/fines/not-a-uuid", Some(token(&member)), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Resource not found");

    let (status, body) = send(&app, "GET", "/books/42", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].is_string());

    let (_, book) = send(
        &app,
        "POST",
        "/books",
        Some(token(&admin)),
        Some(json!({ "title": "Kindred", "author": "Octavia E. Butler" })),
    )
    .await?;
    let book_id = book["id"].as_str().unwrap().to_string();

    // Wrong type for a known field
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/books/{}/rate", book_id),
        Some(token(&member)),
        Some(json!({ "rating": "5" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("rating"));

    // Not JSON at all
    let request = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"email\": "))?;
    let response = app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body: Value = serde_json::from_slice(&bytes)?;
    assert!(body["message"].is_string());

    Ok(())
}

#[tokio::test]
async fn test_fine_summary_is_admin_only() -> anyhow::Result<()> {
    let (app, ctx) = test_app().await?;
    let admin = register(&app, "librarian", Some("admin")).await?;
    let member = register(&app, "reader", None).await?;

    let admin_id = uuid::Uuid::parse_str(admin["id"].as_str().unwrap())?;
    let member_id = uuid::Uuid::parse_str(member["id"].as_str().unwrap())?;
    let book = ctx
        .book_service
        .create(book_request("Parable of the Sower", "Octavia E. Butler", None), admin_id)
        .await?;

    // Fifteen whole days out, five past the grace period
    let issued_at = Utc::now() - Duration::days(15) + Duration::hours(1);
    ctx.issue_service.issue_book_at(member_id, book.id, issued_at).await?;
    ctx.issue_service.refresh_overdue_fines().await?;

    let (status, _) = send(&app, "GET", "/fines/stats/summary", Some(token(&member)), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, summary) = send(&app, "GET", "/fines/stats/summary", Some(token(&admin)), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["totalPending"], 50);
    assert_eq!(summary["pendingCount"], 1);
    assert_eq!(summary["totalPaid"], 0);
    assert_eq!(summary["totalAmount"], 50);
    assert_eq!(summary["count"], 1);

    Ok(())
}

async fn failing_handler() -> AppResult<Json<Value>> {
    Err(AppError::Internal("ledger offline".to_string()))
}

fn failing_app(environment: &str) -> Router {
    let mut settings = test_settings();
    settings.server.environment = environment.to_string();

    Router::new()
        .route("/boom", get(failing_handler))
        .layer(axum::middleware::map_response_with_state(
            Arc::new(settings),
            expose_error_details,
        ))
}

#[tokio::test]
async fn test_error_details_hidden_in_production() -> anyhow::Result<()> {
    let (status, body) = send(&failing_app("development"), "GET", "/boom", None, None).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal server error: ledger offline");
    assert!(body["error"].as_str().unwrap().contains("Internal"));

    let (status, body) = send(&failing_app("production"), "GET", "/boom", None, None).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal server error: ledger offline");
    assert!(body.get("error").is_none());

    Ok(())
}
