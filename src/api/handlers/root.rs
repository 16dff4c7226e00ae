use axum::{http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Bibliotheca API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Library management backend: catalog, loans, fines and payments",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "auth": "/auth",
            "books": "/books",
            "member": "/member",
            "admin": "/admin",
            "fines": "/fines",
            "payment": "/payment"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
