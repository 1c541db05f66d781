//! BookFlow Server - Library Management System
//!
//! REST API server for library management.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::HeaderValue;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookflow_server::{
    api, config::AppConfig, repository::Repository, scheduler, services::Services, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("bookflow_server={},tower_http=debug", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting BookFlow Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let services = Services::new(Repository::new(pool), &config)?;

    if let Some(admin) = &config.admin {
        services.auth.ensure_admin(admin).await?;
    }

    let cancel = CancellationToken::new();
    let scheduler_handle = config.scheduler.enabled.then(|| {
        tokio::spawn(scheduler::run(
            services.clone(),
            config.scheduler.hour_utc,
            cancel.clone(),
        ))
    });

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let cors = build_cors_layer(&config.server.frontend_url)?;
    let rate_limit = config.rate_limit.clone();

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let mut app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    if rate_limit.enabled {
        let governor = GovernorConfigBuilder::default()
            .per_second(rate_limit.replenish_seconds)
            .burst_size(rate_limit.burst_size)
            .finish()
            .context("Invalid rate limit configuration")?;
        app = app.layer(GovernorLayer {
            config: Arc::new(governor),
        });
        tracing::info!(
            replenish_seconds = rate_limit.replenish_seconds,
            burst_size = rate_limit.burst_size,
            "Rate limiting enabled"
        );
    }

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    cancel.cancel();
    if let Some(handle) = scheduler_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// `*` allows any origin, anything else is taken as the single frontend origin
fn build_cors_layer(frontend_url: &str) -> anyhow::Result<CorsLayer> {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if frontend_url == "*" {
        return Ok(cors.allow_origin(Any));
    }
    let origin: HeaderValue = frontend_url
        .parse()
        .with_context(|| format!("Invalid frontend URL '{frontend_url}'"))?;
    Ok(cors.allow_origin(origin))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
