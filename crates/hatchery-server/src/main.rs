// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hatchery Server - Reservation Lifecycle API
//!
//! Boots the reservation engine (admission sweep, pickup reaper, low-stock
//! notifier, email log cleanup) and serves the HTTP API on top of it.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use hatchery_core::config::Config;
use hatchery_core::email::{EmailSink, LogOnlyEmailSink};
use hatchery_core::migrations;
use hatchery_core::persistence::{Persistence, PostgresPersistence, SqlitePersistence};
use hatchery_core::runtime::EngineRuntime;

use hatchery_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hatchery_core=info".parse()?)
                .add_directive("hatchery_server=info".parse()?),
        )
        .init();

    info!("Starting Hatchery Server");

    let config = Config::from_env().context("configuration error")?;

    info!(
        hold_interval_secs = config.hold_interval.as_secs(),
        pickup_timeout_secs = config.pickup_timeout.as_secs(),
        auto_notifications = config.auto_notifications,
        demo_mode = config.demo_mode,
        "Configuration loaded"
    );

    let persistence = connect(&config).await?;

    let engine = EngineRuntime::builder()
        .persistence(persistence)
        .email_sink(email_sink())
        .config(config)
        .build()?
        .start()
        .await;
    let engine = Arc::new(engine);

    info!("Engine initialized successfully");

    let listen_addr =
        std::env::var("HATCHERY_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    info!(addr = %listen_addr, "HTTP API listening");

    let app = hatchery_server::router(AppState { engine: engine.clone() });
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, shutting down engine");
    engine.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

/// Connect to the configured database, run migrations and wrap it in the
/// persistence trait. SQLite URLs get the embedded file backend, anything
/// else is treated as PostgreSQL.
async fn connect(config: &Config) -> Result<Arc<dyn Persistence>> {
    if let Some(path) = config.database_url.strip_prefix("sqlite:") {
        let path = path.trim_start_matches("//");
        info!(path, "Using SQLite backend");
        let persistence = SqlitePersistence::from_path(path).await?;
        return Ok(Arc::new(persistence));
    }

    info!("Connecting to PostgreSQL...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    info!("Running database migrations...");
    migrations::run_postgres(&pool).await?;
    info!("Migrations completed");

    Ok(Arc::new(PostgresPersistence::new(pool)))
}

/// Pick the outbound email transport.
///
/// With the `smtp` feature and `HATCHERY_SMTP_SERVER` set, mail goes over
/// SMTP. Otherwise messages are logged, which keeps the notifier's cooldown
/// bookkeeping intact in mail-less environments.
fn email_sink() -> Arc<dyn EmailSink> {
    #[cfg(feature = "smtp")]
    if let Ok(server) = std::env::var("HATCHERY_SMTP_SERVER") {
        let port = std::env::var("HATCHERY_SMTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(587);
        let username = std::env::var("HATCHERY_SMTP_USERNAME").unwrap_or_default();
        let password = std::env::var("HATCHERY_SMTP_PASSWORD").unwrap_or_default();
        let from = std::env::var("HATCHERY_SMTP_FROM")
            .unwrap_or_else(|_| "noreply@hatchery.local".to_string());

        match hatchery_core::email::SmtpEmailSink::new(&server, port, username, password, from) {
            Ok(sink) => {
                info!(server, port, "Using SMTP email transport");
                return Arc::new(sink);
            }
            Err(err) => {
                tracing::warn!(error = %err, "SMTP setup failed, falling back to log-only email");
            }
        }
    }

    info!("Using log-only email transport");
    Arc::new(LogOnlyEmailSink)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
