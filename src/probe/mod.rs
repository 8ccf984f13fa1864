//! Live host probes.
//!
//! Supports disk usage snapshots (`df`) and reachability of the companion PC
//! (`ping`). Both shell out to system utilities under a hard timeout.

mod disk;
mod host;

pub use disk::*;
pub use host::*;

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("command failed: {0}")]
    Command(String),
    #[error("failed to run probe command: {0}")]
    Io(#[from] io::Error),
}
