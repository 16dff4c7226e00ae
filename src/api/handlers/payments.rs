use axum::{
    extract::{Extension, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{extract::{Json, Path}, middleware::auth::CurrentUser, state::AppState},
    domain::Payment,
    error::Result,
    service::payment_service::ProcessPaymentRequest,
};

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    message: String,
    payment: Payment,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    verified: bool,
    #[serde(flatten)]
    payment: Payment,
}

pub async fn process(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<ProcessPaymentRequest>,
) -> Result<(StatusCode, Json<ProcessResponse>)> {
    let payment = state.service_context.payment_service.process(current.user.id, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ProcessResponse {
            message: "Payment processed".to_string(),
            payment,
        }),
    ))
}

pub async fn status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(reference): Path<String>,
) -> Result<Json<Payment>> {
    let payment = state
        .service_context
        .payment_service
        .status(current.user.id, &reference)
        .await?;
    Ok(Json(payment))
}

pub async fn history(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<Payment>>> {
    let payments = state
        .service_context
        .payment_service
        .history(current.user.id, user_id)
        .await?;
    Ok(Json(payments))
}

pub async fn verify(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>> {
    let payment = state
        .service_context
        .payment_service
        .verify(current.user.id, req.reference.as_deref())
        .await?;
    Ok(Json(VerifyResponse { verified: true, payment }))
}
