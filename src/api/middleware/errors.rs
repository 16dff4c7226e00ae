use std::sync::Arc;

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{config::Settings, error::ErrorDetails};

/// Adds the debug rendering of server errors to the body outside production.
pub async fn expose_error_details(
    State(settings): State<Arc<Settings>>,
    response: Response,
) -> Response {
    if settings.server.is_production() {
        return response;
    }

    match response.extensions().get::<ErrorDetails>().cloned() {
        Some(details) => (
            response.status(),
            Json(json!({
                "message": details.message,
                "error": details.debug,
            })),
        )
            .into_response(),
        None => response,
    }
}
