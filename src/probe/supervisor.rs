//! Supervisor (PM2) process status
//!
//! Runs `pm2 jlist --silent` and keeps the names of processes whose
//! `pm2_env.status` is `"online"`. Any failure yields an empty snapshot:
//! an unknown supervisor state means nothing is online.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

const ONLINE_STATUS: &str = "online";

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn supervisor command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to read supervisor output: {0}")]
    Io(#[source] std::io::Error),

    #[error("supervisor command timed out after {0:?}")]
    Timeout(Duration),

    #[error("supervisor command exited with {0}")]
    ExitStatus(std::process::ExitStatus),

    #[error("failed to parse supervisor output: {0}")]
    Parse(String),
}

/// Names of processes the supervisor reported online in one call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSnapshot {
    online: HashSet<String>,
}

impl ProcessSnapshot {
    /// Snapshot with nothing online, the fail-closed result
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check if `name` was reported online
    pub fn contains(&self, name: &str) -> bool {
        self.online.contains(name)
    }

    pub fn len(&self) -> usize {
        self.online.len()
    }

    pub fn is_empty(&self) -> bool {
        self.online.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ProcessSnapshot {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            online: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// `jlist` entry; everything beyond name and status is ignored
#[derive(Debug, Deserialize)]
struct ProcessDescriptor {
    name: Option<String>,
    pm2_env: Option<ProcessEnv>,
}

#[derive(Debug, Deserialize)]
struct ProcessEnv {
    name: Option<String>,
    status: Option<String>,
}

impl ProcessDescriptor {
    fn online_name(self) -> Option<String> {
        let env = self.pm2_env?;
        if env.status.as_deref() != Some(ONLINE_STATUS) {
            return None;
        }
        self.name
            .filter(|n| !n.is_empty())
            .or(env.name)
            .filter(|n| !n.is_empty())
    }
}

/// Parse `jlist` output into the set of online process names
pub fn parse_process_list(output: &str) -> Result<ProcessSnapshot, SupervisorError> {
    let descriptors: Vec<ProcessDescriptor> =
        serde_json::from_str(output).map_err(|e| SupervisorError::Parse(e.to_string()))?;

    Ok(descriptors
        .into_iter()
        .filter_map(ProcessDescriptor::online_name)
        .collect())
}

/// Source of supervisor-reported process state
///
/// Infallible by contract: implementations degrade to an empty snapshot.
#[async_trait]
pub trait SupervisorSource: Send + Sync {
    /// Fetch the names of processes currently online
    async fn fetch_online(&self) -> ProcessSnapshot;
}

/// Queries PM2 through its CLI
pub struct Pm2Source {
    bin: String,
    args: Vec<String>,
    timeout: Duration,
}

impl Pm2Source {
    /// Create a source running `<bin> jlist --silent`, bounded by `timeout`
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            args: vec!["jlist".to_string(), "--silent".to_string()],
            timeout,
        }
    }

    /// Replace the default `jlist --silent` arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    async fn try_fetch(&self) -> Result<ProcessSnapshot, SupervisorError> {
        let child = Command::new(&self.bin)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(SupervisorError::Spawn)?;

        // On timeout the output future is dropped and kill_on_drop reaps the child
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| SupervisorError::Timeout(self.timeout))?
            .map_err(SupervisorError::Io)?;

        if !output.status.success() {
            return Err(SupervisorError::ExitStatus(output.status));
        }

        parse_process_list(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl SupervisorSource for Pm2Source {
    async fn fetch_online(&self) -> ProcessSnapshot {
        match self.try_fetch().await {
            Ok(snapshot) => {
                debug!(online = snapshot.len(), "supervisor snapshot");
                snapshot
            }
            Err(e) => {
                warn!(
                    bin = %self.bin,
                    error = %e,
                    "Supervisor query failed, treating all processes as offline"
                );
                ProcessSnapshot::empty()
            }
        }
    }
}

/// Mock supervisor reporting a fixed online set
#[cfg(test)]
pub struct MockSupervisor {
    online: std::sync::Mutex<ProcessSnapshot>,
    call_count: std::sync::atomic::AtomicU32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl MockSupervisor {
    pub fn new(online: &[&str]) -> Self {
        Self {
            online: std::sync::Mutex::new(online.iter().copied().collect()),
            call_count: std::sync::atomic::AtomicU32::new(0),
        }
    }

    pub fn set_online(&self, online: &[&str]) {
        *self.online.lock().unwrap() = online.iter().copied().collect();
    }

    /// Number of supervisor queries issued so far
    pub fn calls(&self) -> u32 {
        self.call_count.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
#[async_trait]
impl SupervisorSource for MockSupervisor {
    async fn fetch_online(&self) -> ProcessSnapshot {
        self.call_count
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.online.lock().unwrap().clone()
    }
}
