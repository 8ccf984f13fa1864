//! Privileged action dispatch.
//!
//! Each admin action is bound to one external executable. Dispatch validates
//! the action's inputs, launches the executable detached and reports only
//! whether the launch happened; the scripts log their own progress to the
//! shared audit log.

mod launcher;

pub use launcher::*;

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Environment variable carrying a new account's password to the script.
pub const PASSWORD_ENV: &str = "ORION_WEBDAV_PASSWORD";

const MAX_USERNAME_LEN: usize = 32;

/// Dispatch error types.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("failed to launch {action}: {reason}")]
    LaunchFailed { action: AdminAction, reason: String },
}

/// Operations the control plane can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminAction {
    WakePc,
    SleepPc,
    PiSync,
    Deploy,
    WebdavProvision,
    WebdavDeleteUser,
}

impl AdminAction {
    pub const ALL: &'static [AdminAction] = &[
        Self::WakePc,
        Self::SleepPc,
        Self::PiSync,
        Self::Deploy,
        Self::WebdavProvision,
        Self::WebdavDeleteUser,
    ];

    /// Route and wire name.
    pub fn name(self) -> &'static str {
        match self {
            Self::WakePc => "wake-pc",
            Self::SleepPc => "sleep-pc",
            Self::PiSync => "pi-sync",
            Self::Deploy => "deploy",
            Self::WebdavProvision => "webdav-provision",
            Self::WebdavDeleteUser => "webdav-delete-user",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.name() == name)
    }

    /// Environment variable overriding this action's executable.
    pub fn env_key(self) -> String {
        format!("ORION_ACTION_{}", self.name().to_uppercase().replace('-', "_"))
    }
}

impl std::fmt::Display for AdminAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs supplied with an action. Unused fields are ignored.
#[derive(Debug, Clone, Default)]
pub struct ActionParams {
    pub username: Option<String>,
    pub password: Option<String>,
    pub delete_data: bool,
}

/// Response body for a successful launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReceipt {
    pub status: &'static str,
    pub action: &'static str,
}

/// Maps actions to executables and launches them.
pub struct Dispatcher {
    actions: HashMap<AdminAction, PathBuf>,
    launcher: Arc<dyn ProcessLauncher>,
}

impl Dispatcher {
    pub fn new(actions: HashMap<AdminAction, PathBuf>, launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self { actions, launcher }
    }

    /// Validate `params` for `action` and start its executable.
    ///
    /// Returns as soon as the process exists; its outcome is never observed.
    pub fn dispatch(&self, action: AdminAction, params: &ActionParams) -> Result<DispatchReceipt, DispatchError> {
        let (args, env) = build_invocation(action, params)?;

        let program = self.actions.get(&action).ok_or_else(|| DispatchError::LaunchFailed {
            action,
            reason: "no executable configured".to_string(),
        })?;

        let handle = self
            .launcher
            .launch(program, &args, &env)
            .map_err(|e| DispatchError::LaunchFailed {
                action,
                reason: e.to_string(),
            })?;

        tracing::info!("Dispatched {} ({}), pid {:?}", action, program.display(), handle.pid);

        Ok(DispatchReceipt {
            status: "ok",
            action: action.name(),
        })
    }
}

/// Arguments and environment for one action. Secrets only travel in `env`.
fn build_invocation(
    action: AdminAction,
    params: &ActionParams,
) -> Result<(Vec<String>, Vec<(String, String)>), DispatchError> {
    match action {
        AdminAction::WakePc | AdminAction::SleepPc | AdminAction::PiSync | AdminAction::Deploy => {
            Ok((Vec::new(), Vec::new()))
        }
        AdminAction::WebdavProvision => {
            let username = require_username(params)?;
            let password = params
                .password
                .as_deref()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| DispatchError::InvalidInput("password is required".to_string()))?;
            Ok((
                vec![username.to_string()],
                vec![(PASSWORD_ENV.to_string(), password.to_string())],
            ))
        }
        AdminAction::WebdavDeleteUser => {
            let username = require_username(params)?;
            let mut args = vec![username.to_string()];
            if params.delete_data {
                args.push("--delete-data".to_string());
            }
            Ok((args, Vec::new()))
        }
    }
}

fn require_username(params: &ActionParams) -> Result<&str, DispatchError> {
    let username = params
        .username
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| DispatchError::InvalidInput("username is required".to_string()))?;
    validate_username(username)?;
    Ok(username)
}

/// Usernames are limited to ASCII letters, digits and underscores.
pub fn validate_username(username: &str) -> Result<(), DispatchError> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());
    if username.len() > MAX_USERNAME_LEN || !pattern.is_match(username) {
        return Err(DispatchError::InvalidInput(
            "username may only contain letters, digits and underscores (max 32)".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher(launcher: Arc<RecordingLauncher>) -> Dispatcher {
        let actions = AdminAction::ALL
            .iter()
            .map(|a| (*a, PathBuf::from(format!("/opt/orion/{}", a.name()))))
            .collect();
        Dispatcher::new(actions, launcher)
    }

    fn provision(username: &str, password: &str) -> ActionParams {
        ActionParams {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_action_names_round_trip() {
        for action in AdminAction::ALL {
            assert_eq!(AdminAction::from_name(action.name()), Some(*action));
        }
        assert_eq!(AdminAction::from_name("reboot"), None);
        assert_eq!(AdminAction::WakePc.env_key(), "ORION_ACTION_WAKE_PC");
    }

    #[test]
    fn test_simple_action_launches_without_args() {
        let launcher = Arc::new(RecordingLauncher::default());
        let receipt = dispatcher(launcher.clone())
            .dispatch(AdminAction::WakePc, &ActionParams::default())
            .unwrap();

        assert_eq!(receipt, DispatchReceipt { status: "ok", action: "wake-pc" });
        let launches = launcher.recorded();
        assert_eq!(launches.len(), 1);
        assert_eq!(launches[0].program, PathBuf::from("/opt/orion/wake-pc"));
        assert!(launches[0].args.is_empty());
        assert!(launches[0].env.is_empty());
    }

    #[test]
    fn test_invalid_username_never_launches() {
        let launcher = Arc::new(RecordingLauncher::default());
        let d = dispatcher(launcher.clone());

        let too_long = "a".repeat(33);
        for bad in ["bad name!", "../etc", "a;rm -rf /", "-rf", "", too_long.as_str()] {
            let err = d.dispatch(AdminAction::WebdavProvision, &provision(bad, "x")).unwrap_err();
            assert!(matches!(err, DispatchError::InvalidInput(_)), "{:?}", bad);
        }
        assert!(launcher.recorded().is_empty());
    }

    #[test]
    fn test_provision_passes_password_in_env_only() {
        let launcher = Arc::new(RecordingLauncher::default());
        dispatcher(launcher.clone())
            .dispatch(AdminAction::WebdavProvision, &provision("ruchi_realme", "s3cret pass"))
            .unwrap();

        let launch = &launcher.recorded()[0];
        assert_eq!(launch.args, vec!["ruchi_realme".to_string()]);
        assert!(!launch.args.iter().any(|a| a.contains("s3cret")));
        assert_eq!(launch.env, vec![(PASSWORD_ENV.to_string(), "s3cret pass".to_string())]);
    }

    #[test]
    fn test_provision_requires_password() {
        let launcher = Arc::new(RecordingLauncher::default());
        let params = ActionParams {
            username: Some("praveen".to_string()),
            ..Default::default()
        };
        let err = dispatcher(launcher.clone())
            .dispatch(AdminAction::WebdavProvision, &params)
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidInput(_)));
        assert!(launcher.recorded().is_empty());
    }

    #[test]
    fn test_delete_user_flag() {
        let launcher = Arc::new(RecordingLauncher::default());
        let d = dispatcher(launcher.clone());
        let mut params = ActionParams {
            username: Some("praveen_flip".to_string()),
            ..Default::default()
        };
        d.dispatch(AdminAction::WebdavDeleteUser, &params).unwrap();
        params.delete_data = true;
        d.dispatch(AdminAction::WebdavDeleteUser, &params).unwrap();

        let launches = launcher.recorded();
        assert_eq!(launches[0].args, vec!["praveen_flip".to_string()]);
        assert_eq!(
            launches[1].args,
            vec!["praveen_flip".to_string(), "--delete-data".to_string()]
        );
    }

    #[test]
    fn test_launch_failure() {
        let d = dispatcher(Arc::new(RecordingLauncher::failing()));
        let err = d.dispatch(AdminAction::Deploy, &ActionParams::default()).unwrap_err();
        assert!(matches!(err, DispatchError::LaunchFailed { action: AdminAction::Deploy, .. }));
    }

    #[test]
    fn test_unconfigured_action() {
        let d = Dispatcher::new(HashMap::new(), Arc::new(RecordingLauncher::default()));
        let err = d.dispatch(AdminAction::PiSync, &ActionParams::default()).unwrap_err();
        assert!(matches!(err, DispatchError::LaunchFailed { .. }));
    }
}
