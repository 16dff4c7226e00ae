use axum::{
    extract::{Extension, State},
    http::StatusCode,
};

use crate::{
    api::{extract::Json, middleware::auth::CurrentUser, state::AppState},
    domain::{LoginRequest, RegisterRequest, User},
    error::Result,
    service::user_service::AuthResponse,
};

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let response = state.service_context.user_service.register(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let response = state.service_context.user_service.login(req).await?;
    Ok(Json(response))
}

pub async fn me(Extension(current): Extension<CurrentUser>) -> Json<User> {
    Json(current.user)
}
