//! Controller configuration
//!
//! Two pieces of configuration drive a controller:
//! - [`DesiredConfig`]: what the workload should look like (environment variable
//!   and file templates), produced by the packaging tooling as JSON or YAML.
//! - [`ControllerSettings`]: how this controller talks to the workload container
//!   (service and layer names, lifecycle command, descriptor path).

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use warden_common::{
    Error, CNB_LIFECYCLE_WEB_PATH, CNB_METADATA_PATH, DEFAULT_LAYER_NAME, DEFAULT_SERVICE_NAME,
};

/// An environment variable whose value is a template
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct EnvironmentTemplate {
    /// Variable name
    pub name: String,
    /// Template producing the value
    #[serde(alias = "value")]
    pub template: String,
}

/// A file in the workload container whose content is a template
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct FileTemplate {
    /// Absolute path in the workload container
    pub path: String,
    /// Template producing the content
    #[serde(alias = "content")]
    pub template: String,
}

/// Desired workload configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DesiredConfig {
    /// Environment variables, in declaration order
    #[serde(default)]
    pub environment: Vec<EnvironmentTemplate>,
    /// Files, in declaration order
    #[serde(default)]
    pub files: Vec<FileTemplate>,
}

impl DesiredConfig {
    /// Parse a desired configuration from JSON or YAML text
    pub fn parse(content: &str) -> Result<Self, Error> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::serialization_for_kind("DesiredConfig", e.to_string()))
    }

    /// Load a desired configuration file (JSON or YAML)
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::serialization_for_kind(
                "DesiredConfig",
                format!("cannot read {}: {}", path.display(), e),
            )
        })?;
        Self::parse(&content)
    }

    /// Check that the configuration can be applied to a container
    ///
    /// Environment names must be non-empty and unique; file paths must be
    /// absolute and unique.
    pub fn validate(&self) -> Result<(), Error> {
        let mut names = HashSet::new();
        for entry in &self.environment {
            if entry.name.trim().is_empty() {
                return Err(Error::configuration(
                    "environment variable name cannot be empty",
                ));
            }
            if entry.name.contains('=') {
                return Err(Error::configuration_for(
                    &entry.name,
                    format!("environment variable name '{}' contains '='", entry.name),
                ));
            }
            if !names.insert(entry.name.as_str()) {
                return Err(Error::configuration_for(
                    &entry.name,
                    format!("environment variable '{}' is declared twice", entry.name),
                ));
            }
        }

        let mut paths = HashSet::new();
        for file in &self.files {
            if !file.path.starts_with('/') {
                return Err(Error::configuration_for(
                    &file.path,
                    format!("file path '{}' must be absolute", file.path),
                ));
            }
            if !paths.insert(file.path.as_str()) {
                return Err(Error::configuration_for(
                    &file.path,
                    format!("file '{}' is declared twice", file.path),
                ));
            }
        }

        Ok(())
    }
}

/// Settings describing the workload container
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerSettings {
    /// Name of this controller's own unit; excluded from relation unit data
    pub unit_name: String,
    /// Supervisor service running the workload
    pub service_name: String,
    /// Supervisor layer declaring the service
    pub layer_name: String,
    /// Command the service runs
    pub command: String,
    /// Descriptor used to classify the workload
    pub metadata_path: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            unit_name: "warden/0".to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            layer_name: DEFAULT_LAYER_NAME.to_string(),
            command: CNB_LIFECYCLE_WEB_PATH.to_string(),
            metadata_path: CNB_METADATA_PATH.to_string(),
        }
    }
}

impl ControllerSettings {
    /// Settings for the given unit with every other value defaulted
    pub fn for_unit(unit_name: impl Into<String>) -> Self {
        Self {
            unit_name: unit_name.into(),
            ..Default::default()
        }
    }
}
