//! Process supervisor seam
//!
//! The supervisor runs the workload inside its container and exposes the
//! container filesystem. The controller only needs a handful of operations,
//! captured by the [`Supervisor`] trait so reconciliation can be tested
//! without a live container.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::config::ControllerSettings;

/// Errors reported by the supervisor
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SupervisorError {
    /// The requested path does not exist in the workload container
    #[error("no such file or directory: {path}")]
    NotFound {
        /// Path that was requested
        path: String,
    },

    /// The supervisor is not reachable (container not started yet, socket missing)
    #[error("supervisor unavailable: {0}")]
    Unavailable(String),

    /// The supervisor rejected the request
    #[error("supervisor api error: {0}")]
    Api(String),
}

/// Whether a layer's service definition replaces or merges with earlier ones
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Override {
    /// Merge fields into the existing definition
    Merge,
    /// Replace the existing definition entirely
    #[default]
    Replace,
}

/// Whether the supervisor starts the service on boot
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Startup {
    /// Started automatically
    #[default]
    Enabled,
    /// Started only on request
    Disabled,
}

/// Service definition inside a layer
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServiceSpec {
    /// How this definition combines with earlier layers
    #[serde(rename = "override")]
    pub override_mode: Override,
    /// Short description
    pub summary: String,
    /// Command line to run
    pub command: String,
    /// Environment of the process
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Startup policy
    pub startup: Startup,
}

/// Declarative description of how the supervisor runs the workload
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Layer {
    /// Short description
    pub summary: String,
    /// Longer description
    pub description: String,
    /// Services declared by this layer
    pub services: BTreeMap<String, ServiceSpec>,
}

impl Layer {
    /// Layer declaring the single workload service with the given environment
    pub fn for_workload(
        settings: &ControllerSettings,
        environment: BTreeMap<String, String>,
    ) -> Self {
        let mut services = BTreeMap::new();
        services.insert(
            settings.service_name.clone(),
            ServiceSpec {
                override_mode: Override::Replace,
                summary: "Bootstraps the Cloud Native Buildpack lifecycle".to_string(),
                command: settings.command.clone(),
                environment,
                startup: Startup::Enabled,
            },
        );

        Self {
            summary: "cnb lifecycle layer".to_string(),
            description: "Supervisor service layer to start the application".to_string(),
            services,
        }
    }
}

/// Operations the controller performs against the workload container
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Supervisor: Send + Sync {
    /// Read a file from the workload container
    async fn pull(&self, path: &str) -> Result<Vec<u8>, SupervisorError>;

    /// Write a file into the workload container
    async fn push(&self, path: &str, content: &[u8]) -> Result<(), SupervisorError>;

    /// Add a layer; with `combine`, a layer of the same name is merged into
    async fn add_layer(&self, name: &str, layer: &Layer, combine: bool)
        -> Result<(), SupervisorError>;

    /// Whether the service is currently running
    async fn is_running(&self, service: &str) -> Result<bool, SupervisorError>;

    /// Start the service
    async fn start(&self, service: &str) -> Result<(), SupervisorError>;

    /// Stop the service
    async fn stop(&self, service: &str) -> Result<(), SupervisorError>;
}

// =============================================================================
// In-memory supervisor
// =============================================================================

/// A supervisor call with side effects, as recorded by [`InMemorySupervisor`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SupervisorCall {
    /// `push(path, ..)`
    Push(String),
    /// `add_layer(name, ..)`
    AddLayer(String),
    /// `start(service)`
    Start(String),
    /// `stop(service)`
    Stop(String),
}

#[derive(Debug, Default)]
struct ContainerState {
    unavailable: bool,
    files: BTreeMap<String, Vec<u8>>,
    failing_pushes: BTreeSet<String>,
    layers: Vec<(String, Layer)>,
    running: BTreeMap<String, BTreeMap<String, String>>,
    calls: Vec<SupervisorCall>,
}

impl ContainerState {
    fn ensure_available(&self) -> Result<(), SupervisorError> {
        if self.unavailable {
            return Err(SupervisorError::Unavailable(
                "cannot connect to the supervisor socket".to_string(),
            ));
        }
        Ok(())
    }

    /// Effective service definitions after applying every layer in order
    fn plan(&self) -> BTreeMap<String, ServiceSpec> {
        let mut services: BTreeMap<String, ServiceSpec> = BTreeMap::new();
        for (_, layer) in &self.layers {
            for (name, spec) in &layer.services {
                merge_service(&mut services, name, spec);
            }
        }
        services
    }
}

fn merge_service(services: &mut BTreeMap<String, ServiceSpec>, name: &str, spec: &ServiceSpec) {
    match (spec.override_mode, services.get_mut(name)) {
        (Override::Merge, Some(existing)) => {
            if !spec.command.is_empty() {
                existing.command = spec.command.clone();
            }
            if !spec.summary.is_empty() {
                existing.summary = spec.summary.clone();
            }
            existing
                .environment
                .extend(spec.environment.iter().map(|(k, v)| (k.clone(), v.clone())));
            existing.startup = spec.startup;
        }
        _ => {
            services.insert(name.to_string(), spec.clone());
        }
    }
}

/// Supervisor backed by process-local state
///
/// Used by the CLI to simulate a pass without a container, and by tests to
/// observe side effects across several passes.
#[derive(Debug, Default)]
pub struct InMemorySupervisor {
    state: Mutex<ContainerState>,
}

impl InMemorySupervisor {
    /// An empty, reachable container
    pub fn new() -> Self {
        Self::default()
    }

    /// A container whose supervisor is not reachable yet
    pub fn unavailable() -> Self {
        Self {
            state: Mutex::new(ContainerState {
                unavailable: true,
                ..Default::default()
            }),
        }
    }

    /// Seed a file into the container
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.state
            .get_mut()
            .files
            .insert(path.into(), content.into());
        self
    }

    /// Make the supervisor reachable or unreachable
    pub async fn set_available(&self, available: bool) {
        self.state.lock().await.unavailable = !available;
    }

    /// Make every push to `path` fail
    pub async fn fail_pushes_to(&self, path: impl Into<String>) {
        self.state.lock().await.failing_pushes.insert(path.into());
    }

    /// Content of a file in the container
    pub async fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().await.files.get(path).cloned()
    }

    /// Effective definition of a service after merging all layers
    pub async fn service(&self, name: &str) -> Option<ServiceSpec> {
        self.state.lock().await.plan().remove(name)
    }

    /// Environment the running service was started with
    pub async fn running_environment(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.state.lock().await.running.get(name).cloned()
    }

    /// Every side-effecting call, in order
    pub async fn calls(&self) -> Vec<SupervisorCall> {
        self.state.lock().await.calls.clone()
    }

    /// Number of recorded calls matching the predicate
    pub async fn count(&self, predicate: impl Fn(&SupervisorCall) -> bool) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    /// Simulate the workload exiting on its own
    pub async fn crash(&self, service: &str) {
        self.state.lock().await.running.remove(service);
    }
}

#[async_trait]
impl Supervisor for InMemorySupervisor {
    async fn pull(&self, path: &str) -> Result<Vec<u8>, SupervisorError> {
        let state = self.state.lock().await;
        state.ensure_available()?;
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| SupervisorError::NotFound {
                path: path.to_string(),
            })
    }

    async fn push(&self, path: &str, content: &[u8]) -> Result<(), SupervisorError> {
        let mut state = self.state.lock().await;
        state.ensure_available()?;
        state.calls.push(SupervisorCall::Push(path.to_string()));
        if state.failing_pushes.contains(path) {
            return Err(SupervisorError::Api(format!("permission denied: {}", path)));
        }
        state.files.insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn add_layer(
        &self,
        name: &str,
        layer: &Layer,
        combine: bool,
    ) -> Result<(), SupervisorError> {
        let mut state = self.state.lock().await;
        state.ensure_available()?;
        state.calls.push(SupervisorCall::AddLayer(name.to_string()));

        match state.layers.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, existing)) if combine => {
                existing.summary = layer.summary.clone();
                existing.description = layer.description.clone();
                for (service, spec) in &layer.services {
                    merge_service(&mut existing.services, service, spec);
                }
            }
            Some(_) => {
                return Err(SupervisorError::Api(format!(
                    "layer \"{}\" already exists",
                    name
                )));
            }
            None => state.layers.push((name.to_string(), layer.clone())),
        }

        debug!(layer = %name, "layer added");
        Ok(())
    }

    async fn is_running(&self, service: &str) -> Result<bool, SupervisorError> {
        let state = self.state.lock().await;
        state.ensure_available()?;
        Ok(state.running.contains_key(service))
    }

    async fn start(&self, service: &str) -> Result<(), SupervisorError> {
        let mut state = self.state.lock().await;
        state.ensure_available()?;
        state.calls.push(SupervisorCall::Start(service.to_string()));

        let spec = state
            .plan()
            .remove(service)
            .ok_or_else(|| SupervisorError::Api(format!("service \"{}\" not found", service)))?;
        if state.running.contains_key(service) {
            return Err(SupervisorError::Api(format!(
                "service \"{}\" is already running",
                service
            )));
        }
        state.running.insert(service.to_string(), spec.environment);
        Ok(())
    }

    async fn stop(&self, service: &str) -> Result<(), SupervisorError> {
        let mut state = self.state.lock().await;
        state.ensure_available()?;
        state.calls.push(SupervisorCall::Stop(service.to_string()));

        if state.running.remove(service).is_none() {
            return Err(SupervisorError::Api(format!(
                "service \"{}\" is not running",
                service
            )));
        }
        Ok(())
    }
}
