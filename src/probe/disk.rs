//! Disk usage probe.

use serde::Serialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::ProbeError;

/// Usage of one mounted block device, sizes as `df -h` prints them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskEntry {
    pub filesystem: String,
    pub size: String,
    pub used: String,
    pub available: String,
    pub percent: u8,
    pub mount: String,
}

/// Snapshot usage of every `/dev/*` filesystem.
pub async fn disk_status(timeout: Duration) -> Result<Vec<DiskEntry>, ProbeError> {
    let mut df = Command::new("df");
    df.arg("-h");
    run_df(df, timeout).await
}

async fn run_df(mut command: Command, timeout: Duration) -> Result<Vec<DiskEntry>, ProbeError> {
    let run = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, run)
        .await
        .map_err(|_| ProbeError::Timeout(timeout))??;

    let stdout = String::from_utf8_lossy(&output.stdout);

    // df exits non-zero when any single mount is unreadable; keep what it did print
    if !output.status.success() && stdout.trim().is_empty() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProbeError::Command(format!("df failed: {}", stderr.trim())));
    }

    Ok(parse_df_output(&stdout))
}

/// Parse `df -h` output, keeping device-backed rows and skipping malformed ones.
pub fn parse_df_output(output: &str) -> Vec<DiskEntry> {
    output
        .lines()
        .filter(|line| line.starts_with("/dev/"))
        .filter_map(parse_df_line)
        .collect()
}

fn parse_df_line(line: &str) -> Option<DiskEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 6 {
        tracing::debug!("Skipping short df line: {}", line);
        return None;
    }

    let percent = match fields[4].strip_suffix('%').and_then(|p| p.parse::<u8>().ok()) {
        Some(p) => p,
        None => {
            tracing::debug!("Skipping df line with bad percentage: {}", line);
            return None;
        }
    };

    Some(DiskEntry {
        filesystem: fields[0].to_string(),
        size: fields[1].to_string(),
        used: fields[2].to_string(),
        available: fields[3].to_string(),
        percent,
        // Mount points may contain spaces
        mount: fields[5..].join(" "),
    })
}
