use axum::extract::{Extension, State};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    api::{extract::{Json, Path}, middleware::auth::CurrentUser, state::AppState},
    domain::{Fine, FineDetails, FineSummary},
    error::Result,
};

#[derive(Debug, Serialize)]
pub struct PaidResponse {
    message: String,
    fine: Fine,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<FineDetails>>> {
    let fines = state.service_context.fine_service.list(&current.user).await?;
    Ok(Json(fines))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<FineDetails>> {
    let fine = state.service_context.fine_service.get(&current.user, id).await?;
    Ok(Json(fine))
}

pub async fn mark_paid(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaidResponse>> {
    let fine = state.service_context.fine_service.pay_as_admin(id).await?;
    Ok(Json(PaidResponse {
        message: "Fine marked as paid".to_string(),
        fine,
    }))
}

pub async fn summary(State(state): State<AppState>) -> Result<Json<FineSummary>> {
    let summary = state.service_context.fine_service.summary().await?;
    Ok(Json(summary))
}
