//! Vendor Wallet Service - Main Application Entry Point
//!
//! A REST API server that keeps a per-vendor wallet ledger for a field-service
//! platform: task earnings, cash-collection commissions, penalties, acceptance fees,
//! deposits and the withdrawal request workflow.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key with SHA-256 hashing, vendor and admin roles
//! - **Notifications**: signed webhooks delivered by a background dispatcher
//!
//! # Startup Flow
//!
//! 1. Load configuration from `.env` and environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Start the notification dispatcher
//! 5. Build HTTP router with routes and middleware
//! 6. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::{
    services::{notification_service, payment_gateway::PaymentGateway, webhook_service},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controls verbosity, defaulting to info
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!(
        gst_rate_percent = %config.gst_rate_percent,
        amount_parse_policy = ?config.amount_parse_policy,
        "Configuration loaded"
    );

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let http_client = webhook_service::delivery_client(config.webhook_timeout_secs)?;

    let (notifier, receiver) = notification_service::Notifier::channel(config.notification_buffer);
    tokio::spawn(notification_service::run_dispatcher(
        pool.clone(),
        http_client.clone(),
        receiver,
    ));

    let state = AppState {
        pool,
        settings: Arc::new(config.wallet_settings()),
        notifier,
        gateway: PaymentGateway::new(http_client, &config),
    };

    let app = routes::router(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
