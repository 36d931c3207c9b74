//! Controller status and error translation
//!
//! A pass communicates its outcome to operators only through a
//! [`ControllerStatus`]. Statuses are published through a [`StatusSink`],
//! which is fire-and-forget: publishing never fails a pass.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use warden_common::Error;

/// Well-known status messages
pub mod messages {
    /// Initial status before the first pass completes
    pub const WAITING_FOR_SUPERVISOR: &str =
        "Waiting for the supervisor to initialize in the workload container";
    /// Prefix of the missing-relations status; names follow, comma separated
    pub const MISSING_RELATIONS: &str = "Required consumed relations are missing";
    /// The workload image has no buildpack descriptor
    pub const NOT_PACKAGED: &str = "Application not packaged with Cloud Native Buildpacks";
    /// Environment templates failed to render
    pub const CANNOT_RENDER_ENVIRONMENT: &str = "Cannot render environment variables";
    /// File templates failed to render
    pub const CANNOT_RENDER_FILES: &str = "Cannot render files";
    /// Layer merged, deciding between start, restart and no-op
    pub const EVALUATING_RESTART: &str = "Evaluating an application (re)start";
    /// Environment changed on a running service
    pub const RESTARTING: &str = "Restarting the application";
    /// Service not running
    pub const STARTING: &str = "Starting the application";
}

/// User-visible status of the controller
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "level", content = "message", rename_all = "lowercase")]
pub enum ControllerStatus {
    /// Work in progress
    Maintenance(String),
    /// Waiting on something outside the controller
    Waiting(String),
    /// Needs operator intervention
    Blocked(String),
    /// Converged
    Active,
}

impl ControllerStatus {
    /// Maintenance status
    pub fn maintenance(msg: impl Into<String>) -> Self {
        Self::Maintenance(msg.into())
    }

    /// Waiting status
    pub fn waiting(msg: impl Into<String>) -> Self {
        Self::Waiting(msg.into())
    }

    /// Blocked status
    pub fn blocked(msg: impl Into<String>) -> Self {
        Self::Blocked(msg.into())
    }

    /// Status level name
    pub fn level(&self) -> &'static str {
        match self {
            Self::Maintenance(_) => "maintenance",
            Self::Waiting(_) => "waiting",
            Self::Blocked(_) => "blocked",
            Self::Active => "active",
        }
    }

    /// Status message; empty for `Active`
    pub fn message(&self) -> &str {
        match self {
            Self::Maintenance(msg) | Self::Waiting(msg) | Self::Blocked(msg) => msg,
            Self::Active => "",
        }
    }
}

impl fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            other => write!(f, "{}: {}", other.level(), other.message()),
        }
    }
}

/// Status writes made during one pass, in order
///
/// The last entry is the pass's final status.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusTrail {
    entries: Vec<ControllerStatus>,
}

impl StatusTrail {
    /// An empty trail
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a status write
    pub fn set(&mut self, status: ControllerStatus) {
        self.entries.push(status);
    }

    /// Latest status, if any was written
    pub fn current(&self) -> Option<&ControllerStatus> {
        self.entries.last()
    }

    /// Every status written, in order
    pub fn into_entries(self) -> Vec<ControllerStatus> {
        self.entries
    }
}

/// Map a pass failure to the status to show and whether to defer the trigger
pub fn translate(err: &Error) -> (ControllerStatus, bool) {
    let status = match err {
        Error::NotYetReady { message } => ControllerStatus::waiting(message.clone()),
        Error::Io { message, .. } => ControllerStatus::waiting(message.clone()),
        Error::Store { message } => {
            ControllerStatus::waiting(format!("Cannot persist controller state: {}", message))
        }
        Error::Configuration { message, .. } => ControllerStatus::blocked(message.clone()),
        Error::Serialization { message, .. } => ControllerStatus::blocked(message.clone()),
    };
    (status, err.is_retryable())
}

/// Receiver of the final status of each pass
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Publish a status; failures are logged, never returned
    async fn publish(&self, status: &ControllerStatus);
}

/// Sink writing statuses to the log
pub struct LogStatusSink;

#[async_trait]
impl StatusSink for LogStatusSink {
    async fn publish(&self, status: &ControllerStatus) {
        match status {
            ControllerStatus::Blocked(msg) => warn!(level = "blocked", message = %msg, "status"),
            other => info!(level = other.level(), message = %other.message(), "status"),
        }
    }
}

/// Sink keeping every published status in memory
#[derive(Default)]
pub struct RecordingStatusSink {
    published: Mutex<Vec<ControllerStatus>>,
}

impl RecordingStatusSink {
    /// An empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far
    pub async fn published(&self) -> Vec<ControllerStatus> {
        self.published.lock().await.clone()
    }

    /// Most recently published status
    pub async fn last(&self) -> Option<ControllerStatus> {
        self.published.lock().await.last().cloned()
    }
}

#[async_trait]
impl StatusSink for RecordingStatusSink {
    async fn publish(&self, status: &ControllerStatus) {
        self.published.lock().await.push(status.clone());
    }
}
