//! Orion admin - remote administration control plane for the home server.
//!
//! Authenticates the operator, dispatches privileged scripts and serves the
//! audit log, health metrics and disk usage to the dashboard.

mod audit;
mod auth;
mod config;
mod db;
mod dispatch;
mod probe;
mod web;
mod webdav;

use auth::{CredentialGuard, SystemClock};
use config::ServerConfig;
use db::Store;
use dispatch::{Dispatcher, TokioLauncher};
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("orion_admin=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load()?;
    tracing::info!("Starting Orion admin on {}:{}...", cfg.bind_addr, cfg.http_port);
    tracing::info!("Using attempt ledger at {}", cfg.ledger_path);
    tracing::info!("Reading metrics from {}", cfg.metrics_db_path);

    // Initialize attempt ledger
    let store = Store::new(&cfg.ledger_path)?;
    tracing::info!("Attempt ledger initialized successfully");

    let guard = CredentialGuard::new(
        cfg.identity.clone(),
        cfg.lockout,
        store,
        Arc::new(SystemClock),
    );
    let dispatcher = Dispatcher::new(cfg.actions.clone(), Arc::new(TokioLauncher));

    // Start web server
    let server = Server::new(cfg, guard, dispatcher);
    server.start().await?;

    Ok(())
}
