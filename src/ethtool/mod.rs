//! Reads NIC driver statistics by running `ethtool -S <interface>`.
//!
//! The dump is plain text with one `name: value` counter per line. Driver
//! counter names vary a lot between NICs, see [`normalize`] for how they are
//! mapped onto metric names.

mod normalize;

pub use normalize::{normalize_dump, normalize_line};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use std::process::Stdio;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("timed out after {timeout:?} getting statistics for interface {interface}")]
    Timeout {
        interface: String,
        timeout: Duration,
    },
    #[error("failed to run {program} for interface {interface}: {source}")]
    Spawn {
        program: String,
        interface: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status} for interface {interface}: {stderr}")]
    Failed {
        program: String,
        interface: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Something that can produce a counter dump for a network interface.
#[async_trait]
pub trait CounterSource: Send + Sync {
    async fn dump(&self, interface: &str) -> Result<String, CollectError>;
}

/// Runs the ethtool binary with a deadline. The child is killed if the
/// deadline passes.
pub struct Ethtool {
    program: String,
    timeout: Duration,
}

impl Ethtool {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CounterSource for Ethtool {
    async fn dump(&self, interface: &str) -> Result<String, CollectError> {
        debug!("running {} -S {interface}", self.program);

        let child = Command::new(&self.program)
            .arg("-S")
            .arg(interface)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CollectError::Spawn {
                program: self.program.clone(),
                interface: interface.to_string(),
                source,
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| CollectError::Spawn {
                program: self.program.clone(),
                interface: interface.to_string(),
                source,
            })?,
            Err(_) => {
                return Err(CollectError::Timeout {
                    interface: interface.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        if !output.status.success() {
            return Err(CollectError::Failed {
                program: self.program.clone(),
                interface: interface.to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
