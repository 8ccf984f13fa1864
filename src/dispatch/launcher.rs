//! Detached process launching.

use std::io;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

/// `PATH` handed to every launched script.
const CHILD_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Information about a process that was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchHandle {
    pub pid: Option<u32>,
}

/// Starts a program without waiting for it.
///
/// `env` is the complete environment of the child apart from `PATH`;
/// nothing is inherited from the server.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, program: &Path, args: &[String], env: &[(String, String)]) -> io::Result<LaunchHandle>;
}

/// Launcher backed by `tokio::process`.
///
/// The child is reaped by a background task that logs its exit status.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLauncher;

impl ProcessLauncher for TokioLauncher {
    fn launch(&self, program: &Path, args: &[String], env: &[(String, String)]) -> io::Result<LaunchHandle> {
        let mut child = Command::new(program)
            .args(args)
            .env_clear()
            .env("PATH", CHILD_PATH)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let pid = child.id();
        let name = program.display().to_string();

        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    tracing::info!("{} (pid {:?}) finished: {}", name, pid, status);
                }
                Ok(status) => tracing::warn!("{} (pid {:?}) finished: {}", name, pid, status),
                Err(e) => tracing::warn!("Failed to reap {} (pid {:?}): {}", name, pid, e),
            }
        });

        Ok(LaunchHandle { pid })
    }
}

/// A launch that a [`RecordingLauncher`] saw.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLaunch {
    pub program: std::path::PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Test launcher that records invocations instead of spawning.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    pub launches: std::sync::Mutex<Vec<RecordedLaunch>>,
    pub fail: bool,
}

#[cfg(test)]
impl RecordingLauncher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn recorded(&self) -> Vec<RecordedLaunch> {
        self.launches.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ProcessLauncher for RecordingLauncher {
    fn launch(&self, program: &Path, args: &[String], env: &[(String, String)]) -> io::Result<LaunchHandle> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such file"));
        }
        self.launches.lock().unwrap().push(RecordedLaunch {
            program: program.to_path_buf(),
            args: args.to_vec(),
            env: env.to_vec(),
        });
        Ok(LaunchHandle { pid: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_launch_missing_program() {
        let result = TokioLauncher.launch(Path::new("/nonexistent/orion/wakemypc"), &[], &[]);
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_launch_returns_without_waiting() {
        let started = std::time::Instant::now();
        let handle = TokioLauncher
            .launch(Path::new("/bin/sleep"), &["2".to_string()], &[])
            .unwrap();
        assert!(handle.pid.is_some());
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }
}
