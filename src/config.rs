//! Configuration module for the Orion admin service.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::dispatch::AdminAction;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

/// The single operator allowed to use the control plane.
#[derive(Clone)]
pub struct Identity {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Sliding-window lockout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Length of the trailing window in seconds (default: 600)
    pub window_secs: u64,
    /// Failures inside the window that trigger a lockout (default: 5)
    pub max_failures: u32,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            window_secs: 600,
            max_failures: 5,
        }
    }
}

/// Where the WebDAV server keeps its accounts and data.
#[derive(Debug, Clone)]
pub struct WebdavConfig {
    /// `username:secret` credential file maintained by the provisioning scripts
    pub users_file: PathBuf,
    /// Directory holding one subdirectory per user
    pub root: PathBuf,
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the web server to (default: 0.0.0.0)
    pub bind_addr: IpAddr,
    /// HTTP port for the web server (default: 8000)
    pub http_port: u16,
    /// Path to the SQLite attempt ledger (default: "orion-admin.db")
    pub ledger_path: String,
    /// Path to the externally populated metrics database
    pub metrics_db_path: String,
    /// Append-only log written by the admin scripts
    pub audit_log_path: PathBuf,
    pub identity: Identity,
    pub lockout: LockoutPolicy,
    /// Executable bound to each admin action
    pub actions: HashMap<AdminAction, PathBuf>,
    /// Companion machine pinged by the PC status route
    pub pc_host: String,
    pub webdav: WebdavConfig,
    /// Ceiling for disk probe, ping and metric queries (default: 5s)
    pub probe_timeout: Duration,
    /// Take the source address from `X-Forwarded-For` (default: false)
    pub trust_forwarded_for: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ORION_BIND_ADDR`: bind address (default: 0.0.0.0)
    /// - `ORION_HTTP_PORT`: HTTP port (default: 8000)
    /// - `ORION_LEDGER_PATH`: attempt ledger file (default: "orion-admin.db")
    /// - `ORION_METRICS_DB`: metrics database file
    /// - `ORION_AUDIT_LOG`: admin action log file
    /// - `ORION_ADMIN_USER`: operator username (default: "orion")
    /// - `ORION_ADMIN_PASSWORD`: operator password (required)
    /// - `ORION_LOCKOUT_WINDOW_SECS`, `ORION_LOCKOUT_MAX_FAILURES`
    /// - `ORION_ACTION_<NAME>`: executable per action, e.g. `ORION_ACTION_WAKE_PC`
    /// - `ORION_PC_HOST`, `ORION_WEBDAV_USERS_FILE`, `ORION_WEBDAV_ROOT`
    /// - `ORION_PROBE_TIMEOUT_SECS`, `ORION_TRUST_FORWARDED_FOR`
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let password = lookup("ORION_ADMIN_PASSWORD")
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::Missing("ORION_ADMIN_PASSWORD"))?;

        let mut cfg = Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: 8000,
            ledger_path: "orion-admin.db".to_string(),
            metrics_db_path: "/home/orion/server/services/pi-monitor/db/pi-monitor.db".to_string(),
            audit_log_path: PathBuf::from("/var/log/orion/admin-actions.log"),
            identity: Identity {
                username: "orion".to_string(),
                password,
            },
            lockout: LockoutPolicy::default(),
            actions: default_actions(),
            pc_host: "192.168.50.2".to_string(),
            webdav: WebdavConfig {
                users_file: PathBuf::from("/home/orion/server/services/webdav/users.conf"),
                root: PathBuf::from("/mnt/orion-nas/users"),
            },
            probe_timeout: Duration::from_secs(5),
            trust_forwarded_for: false,
        };

        if let Some(addr) = lookup("ORION_BIND_ADDR").and_then(|s| s.parse().ok()) {
            cfg.bind_addr = addr;
        }
        if let Some(port) = lookup("ORION_HTTP_PORT").and_then(|s| s.parse().ok()) {
            cfg.http_port = port;
        }
        if let Some(path) = lookup("ORION_LEDGER_PATH") {
            cfg.ledger_path = path;
        }
        if let Some(path) = lookup("ORION_METRICS_DB") {
            cfg.metrics_db_path = path;
        }
        if let Some(path) = lookup("ORION_AUDIT_LOG") {
            cfg.audit_log_path = PathBuf::from(path);
        }
        if let Some(user) = lookup("ORION_ADMIN_USER").filter(|u| !u.is_empty()) {
            cfg.identity.username = user;
        }
        if let Some(secs) = lookup("ORION_LOCKOUT_WINDOW_SECS").and_then(|s| s.parse().ok()) {
            cfg.lockout.window_secs = secs;
        }
        if let Some(max) = lookup("ORION_LOCKOUT_MAX_FAILURES").and_then(|s| s.parse().ok()) {
            cfg.lockout.max_failures = max;
        }
        for action in AdminAction::ALL {
            if let Some(path) = lookup(&action.env_key()) {
                cfg.actions.insert(*action, PathBuf::from(path));
            }
        }
        if let Some(host) = lookup("ORION_PC_HOST") {
            cfg.pc_host = host;
        }
        if let Some(path) = lookup("ORION_WEBDAV_USERS_FILE") {
            cfg.webdav.users_file = PathBuf::from(path);
        }
        if let Some(path) = lookup("ORION_WEBDAV_ROOT") {
            cfg.webdav.root = PathBuf::from(path);
        }
        if let Some(secs) = lookup("ORION_PROBE_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()) {
            cfg.probe_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(flag) = lookup("ORION_TRUST_FORWARDED_FOR") {
            cfg.trust_forwarded_for = flag == "true" || flag == "1";
        }

        Ok(cfg)
    }
}

fn default_actions() -> HashMap<AdminAction, PathBuf> {
    AdminAction::ALL
        .iter()
        .map(|action| {
            let path = match action {
                AdminAction::WakePc => "/usr/local/bin/wakemypc",
                AdminAction::SleepPc => "/usr/local/bin/sleepmypc",
                AdminAction::PiSync => "/home/orion/server/scripts/pi-sync.sh",
                AdminAction::Deploy => "/home/orion/server/scripts/deploy.sh",
                AdminAction::WebdavProvision => "/home/orion/server/scripts/webdav-add-user.sh",
                AdminAction::WebdavDeleteUser => "/home/orion/server/scripts/webdav-delete-user.sh",
            };
            (*action, PathBuf::from(path))
        })
        .collect()
}
