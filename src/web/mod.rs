//! Web server module.

mod error;
mod handlers;

pub use error::*;

use crate::auth::{require_operator, CredentialGuard};
use crate::config::ServerConfig;
use crate::db::MetricsStore;
use crate::dispatch::Dispatcher;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub guard: Arc<CredentialGuard>,
    pub dispatcher: Arc<Dispatcher>,
    pub metrics: MetricsStore,
}

/// Web server for the admin control plane.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, guard: CredentialGuard, dispatcher: Dispatcher) -> Self {
        let metrics = MetricsStore::new(&config.metrics_db_path, config.probe_timeout);
        Self {
            state: AppState {
                config: Arc::new(config),
                guard: Arc::new(guard),
                dispatcher: Arc::new(dispatcher),
                metrics,
            },
        }
    }

    /// Build the router with all routes.
    ///
    /// Everything except `/healthz` sits behind [`require_operator`].
    fn routes(&self) -> Router {
        let protected = Router::new()
            // Dashboard APIs
            .route("/api/pc-status", get(handlers::handle_pc_status))
            .route("/api/metrics/{metric}", get(handlers::handle_metric_series))
            .route("/api/storage/status", get(handlers::handle_storage_status))
            // Admin
            .route("/admin/logs", get(handlers::handle_admin_logs))
            .route("/admin/api/webdav-provision", post(handlers::handle_webdav_provision))
            .route("/admin/api/webdav/users", get(handlers::handle_list_webdav_users))
            .route(
                "/admin/api/webdav/users/{username}",
                delete(handlers::handle_delete_webdav_user),
            )
            .route("/admin/api/{action}", post(handlers::handle_action))
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                require_operator,
            ));

        Router::new()
            .route("/healthz", get(handlers::handle_health))
            .merge(protected)
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(64 * 1024))
            .with_state(self.state.clone())
    }

    /// Start the server on the configured address.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::new(self.state.config.bind_addr, self.state.config.http_port);
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down");
}
