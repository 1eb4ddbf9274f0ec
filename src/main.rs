mod analytics;
mod config;
mod db;
mod domain;
mod middleware;
mod services;
mod state;
mod time_utils;
mod web;

use crate::config::Config;
use crate::middleware::RateLimiter;
use crate::services::oauth::OAuthClient;
use crate::state::SharedState;
use axum::{
    http::{header, HeaderValue},
    routing::get_service,
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    services::{ServeDir, ServeFile},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Login attempts allowed per IP per minute.
const LOGIN_ATTEMPTS_PER_MINUTE: usize = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
        e
    })?;
    tracing::info!("Using timezone {} for calendar dates", config.timezone);

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run database migrations: {}", e);
            e
        })?;
    tracing::info!("Database migrations completed");

    let oauth = OAuthClient::new(config.oauth.clone())?;
    let write_limiter = RateLimiter::new(config.rate_limit_max_requests, config.rate_limit_window_secs);
    let login_limiter = RateLimiter::new(LOGIN_ATTEMPTS_PER_MINUTE, 60);
    let bind_addr = config.bind_addr.clone();

    let shared: SharedState = Arc::new(state::AppState {
        pool: pool.clone(),
        config: Arc::new(config),
        oauth,
        login_limiter,
        write_limiter,
    });

    let mut scheduler = JobScheduler::new().await?;

    // Rate limiter cleanup - drop stale keys every hour
    let shared_for_cleanup = shared.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            let state = shared_for_cleanup.clone();
            Box::pin(async move {
                let logins = state.login_limiter.cleanup().await;
                let writes = state.write_limiter.cleanup().await;
                tracing::info!(
                    "Rate limiter cleanup finished: {} login keys, {} write keys active",
                    logins,
                    writes
                );
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Scheduler started: rate limiter cleanup hourly");

    let static_handler = ServeDir::new("static").not_found_service(ServeFile::new("static/index.html"));

    let app = Router::new()
        .merge(web::routes(shared.clone()))
        .fallback_service(get_service(static_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                )),
        );

    tracing::info!("Listening on {bind_addr}");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Shutting down...");
    scheduler.shutdown().await?;
    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
