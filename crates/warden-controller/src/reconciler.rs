//! Convergence of the workload container with its desired configuration
//!
//! One pass renders every template, pushes files whose content changed,
//! merges the service layer, and then starts, restarts, or leaves the
//! service alone. The service is restarted only when its effective
//! environment differs from the one it was started with.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use warden_common::template::{TemplateEngine, TemplateGlobals};
use warden_common::Error;

use crate::config::{ControllerSettings, DesiredConfig};
use crate::status::{messages, ControllerStatus, StatusTrail};
use crate::store::{StateStore, StoredState};
use crate::supervisor::{Layer, Supervisor};

/// Fully rendered configuration
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderedState {
    /// Environment of the service
    pub environment: BTreeMap<String, String>,
    /// File contents by absolute path
    pub files: BTreeMap<String, String>,
}

/// SHA-256 of file content, hex encoded
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Applies a desired configuration to the workload container
pub struct Reconciler<'a> {
    settings: &'a ControllerSettings,
    supervisor: &'a dyn Supervisor,
    engine: &'a TemplateEngine,
}

impl<'a> Reconciler<'a> {
    /// Reconciler driving `supervisor` with the given settings
    pub fn new(
        settings: &'a ControllerSettings,
        supervisor: &'a dyn Supervisor,
        engine: &'a TemplateEngine,
    ) -> Self {
        Self {
            settings,
            supervisor,
            engine,
        }
    }

    /// Render every environment and file template
    ///
    /// Environment variables are rendered first; a single failure aborts the
    /// whole render so no partial environment is ever applied.
    pub fn render(
        &self,
        desired: &DesiredConfig,
        globals: &TemplateGlobals,
    ) -> Result<RenderedState, Error> {
        desired.validate()?;

        let mut rendered = RenderedState::default();

        for entry in &desired.environment {
            let value = self.engine.render(&entry.template, globals).map_err(|e| {
                debug!(name = %entry.name, error = %e, "environment template failed");
                Error::render(&entry.name, messages::CANNOT_RENDER_ENVIRONMENT, e)
            })?;
            rendered.environment.insert(entry.name.clone(), value);
        }

        for file in &desired.files {
            let content = self.engine.render(&file.template, globals).map_err(|e| {
                debug!(path = %file.path, error = %e, "file template failed");
                Error::render(&file.path, messages::CANNOT_RENDER_FILES, e)
            })?;
            rendered.files.insert(file.path.clone(), content);
        }

        Ok(rendered)
    }

    /// Converge the workload container with `desired`
    ///
    /// Intermediate statuses are appended to `trail`. Persisted state is
    /// saved after every pushed file and after the service is started.
    #[instrument(skip_all, fields(service = %self.settings.service_name))]
    pub async fn reconcile(
        &self,
        desired: &DesiredConfig,
        globals: &TemplateGlobals,
        state: &mut StoredState,
        store: &mut dyn StateStore,
        trail: &mut StatusTrail,
    ) -> Result<ControllerStatus, Error> {
        let rendered = self.render(desired, globals)?;

        self.push_files(&rendered.files, state, store).await?;

        let layer = Layer::for_workload(self.settings, rendered.environment.clone());
        self.supervisor
            .add_layer(&self.settings.layer_name, &layer, true)
            .await
            .map_err(|e| {
                Error::io(
                    "add_layer",
                    format!(
                        "Cannot add layer '{}' to the supervisor: {}",
                        self.settings.layer_name, e
                    ),
                )
            })?;

        trail.set(ControllerStatus::maintenance(messages::EVALUATING_RESTART));
        self.converge_service(rendered.environment, state, store, trail)
            .await?;

        Ok(ControllerStatus::Active)
    }

    async fn push_files(
        &self,
        files: &BTreeMap<String, String>,
        state: &mut StoredState,
        store: &mut dyn StateStore,
    ) -> Result<(), Error> {
        for (path, content) in files {
            let hash = content_hash(content);
            if state.applied.rendered_file_hashes.get(path) == Some(&hash) {
                debug!(path = %path, "file unchanged, skipping push");
                continue;
            }

            self.supervisor
                .push(path, content.as_bytes())
                .await
                .map_err(|e| {
                    Error::io_for(
                        "push",
                        path,
                        format!(
                            "Cannot push file '{}' to the workload container: {}",
                            path, e
                        ),
                    )
                })?;

            info!(path = %path, "file pushed");
            state.applied.rendered_file_hashes.insert(path.clone(), hash);
            store.save(state)?;
        }
        Ok(())
    }

    async fn converge_service(
        &self,
        environment: BTreeMap<String, String>,
        state: &mut StoredState,
        store: &mut dyn StateStore,
        trail: &mut StatusTrail,
    ) -> Result<(), Error> {
        let service = self.settings.service_name.as_str();
        let running = self
            .supervisor
            .is_running(service)
            .await
            .map_err(|e| lifecycle_error("is_running", service, e))?;

        if running {
            if environment == state.applied.current_environment {
                debug!("environment unchanged, no restart needed");
                return Ok(());
            }

            info!("environment changed, restarting");
            trail.set(ControllerStatus::maintenance(messages::RESTARTING));
            self.supervisor
                .stop(service)
                .await
                .map_err(|e| lifecycle_error("stop", service, e))?;
        } else {
            info!("service not running, starting");
            trail.set(ControllerStatus::maintenance(messages::STARTING));
        }

        self.supervisor
            .start(service)
            .await
            .map_err(|e| lifecycle_error("start", service, e))?;

        state.applied.current_environment = environment;
        store.save(state)?;
        Ok(())
    }
}

fn lifecycle_error(operation: &str, service: &str, err: impl std::fmt::Display) -> Error {
    Error::io(
        operation,
        format!("Cannot {} service '{}': {}", operation, service, err),
    )
}
