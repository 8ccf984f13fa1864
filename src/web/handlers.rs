//! HTTP request handlers.

use super::{ApiError, AppState};
use crate::audit::{self, DEFAULT_LINES, MAX_LINES, MIN_LINES};
use crate::auth::Operator;
use crate::db::{metric_for_slug, MetricWindow, Series};
use crate::dispatch::{ActionParams, AdminAction, DispatchReceipt};
use crate::probe::{disk_status, ping_host, DiskEntry};
use crate::webdav::{list_users_async, WebdavUser};

use axum::{
    extract::{Extension, Form, Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ============================================================================
// Liveness
// ============================================================================

pub async fn handle_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ============================================================================
// API: PC status
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PcStatus {
    pub online: bool,
}

pub async fn handle_pc_status(State(state): State<AppState>) -> Json<PcStatus> {
    let online = match ping_host(&state.config.pc_host, state.config.probe_timeout).await {
        Ok(online) => online,
        Err(e) => {
            tracing::warn!("PC status check failed: {}", e);
            false
        }
    };
    Json(PcStatus { online })
}

// ============================================================================
// API: Metrics
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    #[serde(default)]
    pub window: Option<String>,
}

pub async fn handle_metric_series(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Series>, ApiError> {
    let metric = metric_for_slug(&slug)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown metric: {}", slug)))?;
    let window = query
        .window
        .as_deref()
        .map(MetricWindow::parse_or_default)
        .unwrap_or_default();

    Ok(Json(state.metrics.series(metric, window).await?))
}

// ============================================================================
// API: Storage
// ============================================================================

pub async fn handle_storage_status(State(state): State<AppState>) -> Result<Json<Vec<DiskEntry>>, ApiError> {
    Ok(Json(disk_status(state.config.probe_timeout).await?))
}

// ============================================================================
// Admin: Logs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    #[serde(default)]
    pub lines: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub lines: String,
}

pub async fn handle_admin_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<LogResponse>, ApiError> {
    let lines = query.lines.unwrap_or(DEFAULT_LINES);
    if !(MIN_LINES..=MAX_LINES).contains(&lines) {
        return Err(ApiError::BadRequest(format!(
            "lines must be between {} and {}",
            MIN_LINES, MAX_LINES
        )));
    }

    let text = audit::tail_async(state.config.audit_log_path.clone(), lines).await?;
    Ok(Json(LogResponse { lines: text }))
}

// ============================================================================
// Admin: Actions
// ============================================================================

pub async fn handle_action(
    State(state): State<AppState>,
    Extension(operator): Extension<Operator>,
    Path(name): Path<String>,
) -> Result<Json<DispatchReceipt>, ApiError> {
    let action = AdminAction::from_name(&name)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown action: {}", name)))?;

    tracing::info!("{} requested {}", operator.0, action);
    Ok(Json(state.dispatcher.dispatch(action, &ActionParams::default())?))
}

#[derive(Debug, Deserialize)]
pub struct ProvisionForm {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

pub async fn handle_webdav_provision(
    State(state): State<AppState>,
    Extension(operator): Extension<Operator>,
    Form(form): Form<ProvisionForm>,
) -> Result<Json<DispatchReceipt>, ApiError> {
    tracing::info!(
        "{} requested {} for {:?}",
        operator.0,
        AdminAction::WebdavProvision,
        form.username
    );

    let params = ActionParams {
        username: form.username,
        password: form.password,
        delete_data: false,
    };
    Ok(Json(state.dispatcher.dispatch(AdminAction::WebdavProvision, &params)?))
}

// ============================================================================
// Admin: WebDAV users
// ============================================================================

pub async fn handle_list_webdav_users(State(state): State<AppState>) -> Result<Json<Vec<WebdavUser>>, ApiError> {
    let webdav = &state.config.webdav;
    let users = list_users_async(webdav.users_file.clone(), webdav.root.clone()).await?;
    Ok(Json(users))
}

#[derive(Debug, Deserialize)]
pub struct DeleteUserQuery {
    #[serde(default)]
    pub delete_data: bool,
}

pub async fn handle_delete_webdav_user(
    State(state): State<AppState>,
    Extension(operator): Extension<Operator>,
    Path(username): Path<String>,
    Query(query): Query<DeleteUserQuery>,
) -> Result<Json<DispatchReceipt>, ApiError> {
    tracing::info!(
        "{} requested {} for {:?} (delete_data={})",
        operator.0,
        AdminAction::WebdavDeleteUser,
        username,
        query.delete_data
    );

    let params = ActionParams {
        username: Some(username),
        password: None,
        delete_data: query.delete_data,
    };
    Ok(Json(state.dispatcher.dispatch(AdminAction::WebdavDeleteUser, &params)?))
}
