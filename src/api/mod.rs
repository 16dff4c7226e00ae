pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(
    service_context: Arc<ServiceContext>,
    settings: Arc<Settings>,
) -> Router {
    let cors = cors_layer(&settings);
    let app_state = AppState::new(service_context, settings.clone());

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        .nest("/auth", auth_routes(app_state.clone()))
        .nest("/books", book_routes(app_state.clone()))
        .nest("/member", member_routes(app_state.clone()))
        .nest("/admin", admin_routes(app_state.clone()))
        .nest("/fines", fine_routes(app_state.clone()))
        .nest("/payment", payment_routes(app_state.clone()))

        // Add state to the router
        .with_state(app_state)

        // Middleware
        .layer(axum::middleware::map_response_with_state(
            settings,
            middleware::errors::expose_error_details,
        ))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Only the configured frontend may call the API from a browser.
fn cors_layer(settings: &Settings) -> CorsLayer {
    match settings.server.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true),
        Err(e) => {
            tracing::warn!("Invalid frontend_url {:?}: {}. Allowing any origin.", settings.server.frontend_url, e);
            CorsLayer::permissive()
        }
    }
}

fn auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .merge(
            Router::new()
                .route("/me", get(handlers::auth::me))
                .route_layer(axum::middleware::from_fn_with_state(
                    state,
                    middleware::auth::require_auth,
                )),
        )
}

fn book_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Public catalog
        .route("/", get(handlers::books::list))
        .route("/search", get(handlers::books::search))
        .route("/:id", get(handlers::books::get))
        // Any signed-in user may rate
        .merge(
            Router::new()
                .route("/:id/rate", put(handlers::books::rate))
                .route_layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    middleware::auth::require_auth,
                )),
        )
        // Catalog maintenance
        .merge(catalog_admin_routes(state))
}

fn catalog_admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::books::create))
        .route("/:id", put(handlers::books::update).delete(handlers::books::delete))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_admin,
        ))
}

fn member_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/issue", post(handlers::member::issue))
        .route("/return", post(handlers::member::return_book))
        .route("/issues", get(handlers::member::issues))
        .route("/fines", get(handlers::member::fines))
        .route("/fines/:id/pay", post(handlers::member::pay_fine))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(handlers::admin::dashboard))
        .route("/issues", get(handlers::admin::issues))
        .route("/issues/:id/return", put(handlers::admin::force_return))
        .route("/users", get(handlers::admin::users))
        .route("/users/:id/role", put(handlers::admin::update_role))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin,
        ))
        // Same handlers as /books, under the admin prefix
        .nest("/books", catalog_admin_routes(state))
}

fn fine_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::fines::list))
        .route("/:id", get(handlers::fines::get))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ))
        .merge(
            Router::new()
                .route("/stats/summary", get(handlers::fines::summary))
                .route("/:id/pay", put(handlers::fines::mark_paid))
                .route_layer(axum::middleware::from_fn_with_state(
                    state,
                    middleware::auth::require_admin,
                )),
        )
}

fn payment_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/process", post(handlers::payments::process))
        .route("/status/:reference", get(handlers::payments::status))
        .route("/history/:user_id", get(handlers::payments::history))
        .route("/verify", post(handlers::payments::verify))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}
