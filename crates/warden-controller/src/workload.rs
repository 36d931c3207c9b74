//! Workload classification from the buildpack launch descriptor
//!
//! Images built with Cloud Native Buildpacks carry a launch descriptor listing
//! the processes the image can run. The controller reads it once per container
//! generation to learn what kind of application it is supervising.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::supervisor::{Supervisor, SupervisorError};

/// Launcher classes identifying a Spring Boot fat jar
const SPRING_BOOT_LAUNCHERS: &[&str] = &[
    "org.springframework.boot.loader.JarLauncher",
    "org.springframework.boot.loader.launch.JarLauncher",
];

/// What kind of application the workload container runs
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadKind {
    /// The image was not built with Cloud Native Buildpacks
    NotPackaged,
    /// Buildpack image running something other than Java
    Unknown,
    /// Plain JVM application
    Jvm,
    /// Spring Boot application
    SpringBoot,
}

impl WorkloadKind {
    /// Rank used when several processes disagree; higher is more specific
    fn specificity(self) -> u8 {
        match self {
            Self::NotPackaged => 0,
            Self::Unknown => 1,
            Self::Jvm => 2,
            Self::SpringBoot => 3,
        }
    }

    /// Human-readable name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotPackaged => "not-packaged",
            Self::Unknown => "unknown",
            Self::Jvm => "jvm",
            Self::SpringBoot => "spring-boot",
        }
    }
}

impl std::fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process command, either a single executable or a full argv
///
/// Older lifecycles write `command = "java"`; newer platform APIs write
/// `command = ["java", ...]`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ProcessCommand {
    /// Executable only
    Executable(String),
    /// Executable followed by leading arguments
    Argv(Vec<String>),
}

impl ProcessCommand {
    fn executable(&self) -> Option<&str> {
        match self {
            Self::Executable(cmd) => Some(cmd.as_str()),
            Self::Argv(argv) => argv.first().map(String::as_str),
        }
    }

    fn leading_args(&self) -> &[String] {
        match self {
            Self::Executable(_) => &[],
            Self::Argv(argv) => argv.get(1..).unwrap_or(&[]),
        }
    }
}

/// One entry of the descriptor's `[[processes]]` table
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ProcessDefinition {
    /// Process type (`web`, `worker`, ...)
    #[serde(rename = "type", default)]
    pub process_type: String,
    /// Command to run
    pub command: Option<ProcessCommand>,
    /// Arguments
    #[serde(default)]
    pub args: Vec<String>,
}

impl ProcessDefinition {
    fn kind(&self) -> WorkloadKind {
        let Some(command) = &self.command else {
            return WorkloadKind::Unknown;
        };
        if command.executable() != Some("java") {
            return WorkloadKind::Unknown;
        }

        let spring = command
            .leading_args()
            .iter()
            .chain(self.args.iter())
            .any(|arg| SPRING_BOOT_LAUNCHERS.contains(&arg.as_str()));
        if spring {
            WorkloadKind::SpringBoot
        } else {
            WorkloadKind::Jvm
        }
    }
}

/// The launch descriptor written by the buildpack lifecycle
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct LaunchMetadata {
    /// Processes the image can run
    #[serde(default)]
    pub processes: Vec<ProcessDefinition>,
}

impl LaunchMetadata {
    /// Parse the TOML descriptor
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Classify the workload from its process list
    pub fn workload_kind(&self) -> WorkloadKind {
        classify_processes(&self.processes)
    }
}

/// Most specific kind across all processes; `Unknown` when there are none
pub fn classify_processes(processes: &[ProcessDefinition]) -> WorkloadKind {
    processes
        .iter()
        .map(ProcessDefinition::kind)
        .fold(WorkloadKind::Unknown, |best, kind| {
            if kind.specificity() > best.specificity() {
                kind
            } else {
                best
            }
        })
}

/// Classify the workload by reading its descriptor through the supervisor
///
/// Returns `None` when the descriptor cannot be read or parsed; the caller
/// retries on a later pass. A missing descriptor means the image was not
/// built with buildpacks.
pub async fn classify(supervisor: &dyn Supervisor, path: &str) -> Option<WorkloadKind> {
    let bytes = match supervisor.pull(path).await {
        Ok(bytes) => bytes,
        Err(SupervisorError::NotFound { .. }) => {
            debug!(path = %path, "launch descriptor not found");
            return Some(WorkloadKind::NotPackaged);
        }
        Err(e) => {
            debug!(path = %path, error = %e, "cannot read launch descriptor, is the supervisor ready?");
            return None;
        }
    };

    let content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %path, error = %e, "launch descriptor is not valid UTF-8");
            return None;
        }
    };

    match LaunchMetadata::parse(&content) {
        Ok(metadata) => {
            let kind = metadata.workload_kind();
            debug!(path = %path, kind = %kind, "workload classified");
            Some(kind)
        }
        Err(e) => {
            warn!(path = %path, error = %e, "cannot parse launch descriptor");
            None
        }
    }
}
