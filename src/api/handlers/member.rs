use axum::{
    extract::{Extension, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{extract::{Json, Path}, middleware::auth::CurrentUser, state::AppState},
    domain::{Fine, Issue, IssueDetails, MemberFines, ReturnOutcome},
    error::{AppError, Result},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRequest {
    book_id: Option<String>,
}

impl BookRequest {
    fn book_id(&self) -> Result<Uuid> {
        let raw = self
            .book_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::BadRequest("Please provide book ID".to_string()))?;

        Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Book not found".to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct IssueResponse {
    message: String,
    issue: Issue,
}

#[derive(Debug, Serialize)]
pub struct ReturnResponse {
    message: String,
    #[serde(flatten)]
    outcome: ReturnOutcome,
}

#[derive(Debug, Serialize)]
pub struct FineResponse {
    message: String,
    fine: Fine,
}

pub async fn issue(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<BookRequest>,
) -> Result<(StatusCode, Json<IssueResponse>)> {
    let book_id = req.book_id()?;
    let issue = state
        .service_context
        .issue_service
        .issue_book(current.user.id, book_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(IssueResponse {
            message: "Book issued successfully".to_string(),
            issue,
        }),
    ))
}

pub async fn return_book(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<BookRequest>,
) -> Result<Json<ReturnResponse>> {
    let book_id = req.book_id()?;
    let outcome = state
        .service_context
        .issue_service
        .return_book(current.user.id, book_id)
        .await?;

    Ok(Json(ReturnResponse {
        message: "Book returned successfully".to_string(),
        outcome,
    }))
}

pub async fn issues(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<IssueDetails>>> {
    let issues = state.service_context.issue_service.my_issues(current.user.id).await?;
    Ok(Json(issues))
}

pub async fn fines(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<MemberFines>> {
    let fines = state.service_context.fine_service.member_fines(current.user.id).await?;
    Ok(Json(fines))
}

pub async fn pay_fine(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<FineResponse>> {
    let fine = state
        .service_context
        .fine_service
        .pay_as_member(current.user.id, id)
        .await?;

    Ok(Json(FineResponse {
        message: "Fine paid successfully".to_string(),
        fine,
    }))
}
