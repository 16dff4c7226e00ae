use std::{str::FromStr, sync::Arc, time::Duration};
use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bibliotheca::{
    api,
    config::Settings,
    service::{issue_service::IssueService, ServiceContext},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bibliotheca=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration; without a signing secret there is nothing safe to serve
    let settings = Settings::new().context("failed to load configuration")?;

    tracing::info!(
        "Starting Bibliotheca server on {}:{} ({})",
        settings.server.host,
        settings.server.port,
        settings.server.environment
    );

    // Initialize database
    let connect_options = SqliteConnectOptions::from_str(&settings.database.url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect_with(connect_options)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let service_context = Arc::new(ServiceContext::sqlite(db_pool, &settings));

    if settings.fines.refresh_interval_secs > 0 {
        spawn_fine_refresh(
            service_context.issue_service.clone(),
            Duration::from_secs(settings.fines.refresh_interval_secs),
        );
    }

    let app = api::create_app(service_context, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Keeps pending fines current between dashboard loads.
fn spawn_fine_refresh(issue_service: Arc<IssueService>, period: Duration) {
    tracing::info!("Refreshing overdue fines every {}s", period.as_secs());

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if let Err(e) = issue_service.refresh_overdue_fines().await {
                tracing::error!("Overdue fine refresh failed: {}", e);
            }
        }
    });
}
