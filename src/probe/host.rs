//! Reachability check for the companion PC.

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::ProbeError;

/// Send one ping to `address`; `Ok(true)` when it answered.
///
/// A host that does not answer is `Ok(false)`. Errors are reserved for a
/// ping binary that cannot run or a probe that outlives `timeout`.
pub async fn ping_host(address: &str, timeout: Duration) -> Result<bool, ProbeError> {
    let run = Command::new("ping")
        .args(["-c", "1", "-W", "1", "--", address])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    let status = tokio::time::timeout(timeout, run)
        .await
        .map_err(|_| ProbeError::Timeout(timeout))??;

    Ok(status.success())
}
