use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::{
    api::state::AppState,
    domain::User,
    error::{AppError, Result},
};

#[derive(Clone)]
pub struct CurrentUser {
    pub user: User,
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(&request).map(str::to_string);
    let user = authenticate(&state, token).await?;

    request.extensions_mut().insert(CurrentUser { user });

    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(&request).map(str::to_string);
    let user = authenticate(&state, token).await?;

    if !user.is_admin() {
        return Err(AppError::Forbidden("Not authorized as an admin".to_string()));
    }

    request.extensions_mut().insert(CurrentUser { user });

    Ok(next.run(request).await)
}

/// Resolves a bearer token to a stored user.
async fn authenticate(state: &AppState, token: Option<String>) -> Result<User> {
    let token = token.ok_or_else(|| AppError::Unauthorized("Not authorized, no token".to_string()))?;

    let claims = state.service_context.auth_service.verify_token(&token)?;

    // Tokens outlive deleted accounts
    state
        .service_context
        .user_repo
        .find_by_id(claims.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Not authorized, token failed".to_string()))
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
