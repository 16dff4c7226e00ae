use axum::extract::{Extension, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{extract::{Json, Path}, middleware::auth::CurrentUser, state::AppState},
    domain::{IssueDetails, ReturnOutcome, User},
    error::Result,
    service::dashboard_service::Dashboard,
};

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReturnResponse {
    message: String,
    #[serde(flatten)]
    outcome: ReturnOutcome,
}

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    message: String,
    user: User,
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Dashboard>> {
    let dashboard = state.service_context.dashboard_service.load(&current.user).await?;
    Ok(Json(dashboard))
}

pub async fn force_return(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReturnResponse>> {
    let outcome = state.service_context.issue_service.force_return(id).await?;
    Ok(Json(ReturnResponse {
        message: "Book marked as returned".to_string(),
        outcome,
    }))
}

pub async fn issues(State(state): State<AppState>) -> Result<Json<Vec<IssueDetails>>> {
    let issues = state.service_context.issue_service.all_issues().await?;
    Ok(Json(issues))
}

pub async fn users(State(state): State<AppState>) -> Result<Json<Vec<User>>> {
    let users = state.service_context.user_service.list().await?;
    Ok(Json(users))
}

pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RoleRequest>,
) -> Result<Json<RoleResponse>> {
    let user = state
        .service_context
        .user_service
        .update_role(id, req.role.as_deref())
        .await?;

    Ok(Json(RoleResponse {
        message: "User role updated successfully".to_string(),
        user,
    }))
}
