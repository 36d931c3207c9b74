//! Trigger handling
//!
//! Every trigger delivered by the host runs one pass:
//!
//! 1. Triggers that start a new container generation forget the memoized
//!    workload kind
//! 2. The guard checks relations and classification
//! 3. Relation data is aggregated into template globals
//! 4. The reconciler converges the workload container
//! 5. The final status is published and the deferral decision returned

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use warden_common::template::{TemplateEngine, TemplateGlobals};
use warden_common::Error;

use crate::config::{ControllerSettings, DesiredConfig};
use crate::guard::{Guard, Precondition};
use crate::reconciler::{Reconciler, RenderedState};
use crate::relations::{aggregate, RelationSource};
use crate::status::{
    messages, translate, ControllerStatus, LogStatusSink, StatusSink, StatusTrail,
};
use crate::store::{AppliedState, StateStore, StoredState};
use crate::supervisor::Supervisor;
use crate::workload::WorkloadKind;

/// Events delivered by the host runtime
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// The workload container's supervisor became reachable
    WorkloadReady,
    /// The controller started
    Start,
    /// The desired configuration changed
    ConfigChanged,
    /// A peer joined a relation
    RelationJoined(String),
    /// A peer changed its published data
    RelationChanged(String),
    /// A peer left a relation
    RelationBroken(String),
    /// Periodic status refresh
    UpdateStatus,
    /// The controller was upgraded
    Upgrade,
}

impl Trigger {
    /// Whether this trigger invalidates the memoized workload kind
    ///
    /// A ready workload may be running a new image, and an upgraded
    /// controller may classify differently.
    pub fn resets_classification(&self) -> bool {
        matches!(self, Self::WorkloadReady | Self::Upgrade)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkloadReady => f.write_str("workload-ready"),
            Self::Start => f.write_str("start"),
            Self::ConfigChanged => f.write_str("config-changed"),
            Self::RelationJoined(name) => write!(f, "{}-relation-joined", name),
            Self::RelationChanged(name) => write!(f, "{}-relation-changed", name),
            Self::RelationBroken(name) => write!(f, "{}-relation-broken", name),
            Self::UpdateStatus => f.write_str("update-status"),
            Self::Upgrade => f.write_str("upgrade"),
        }
    }
}

/// Result of one pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassOutcome {
    /// Final status, as published
    pub status: ControllerStatus,
    /// Whether the host must redeliver the trigger later
    pub deferred: bool,
    /// Every status written during the pass, final status last
    pub transitions: Vec<ControllerStatus>,
}

/// Collaborators shared by every pass
pub struct Context {
    /// Supervisor of the workload container
    pub supervisor: Arc<dyn Supervisor>,
    /// Relation data visible to the controller
    pub relations: Arc<dyn RelationSource>,
    /// Where final statuses go
    pub status_sink: Arc<dyn StatusSink>,
}

impl Context {
    /// Context publishing statuses to the log
    pub fn new(supervisor: Arc<dyn Supervisor>, relations: Arc<dyn RelationSource>) -> Self {
        Self {
            supervisor,
            relations,
            status_sink: Arc::new(LogStatusSink),
        }
    }

    /// Replace the status sink
    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status_sink = sink;
        self
    }
}

/// The sidecar controller
pub struct Controller {
    settings: ControllerSettings,
    desired: DesiredConfig,
    ctx: Context,
    store: Box<dyn StateStore>,
    engine: TemplateEngine,
    state: StoredState,
    status: ControllerStatus,
}

enum PassResult {
    Done(ControllerStatus),
    Deferred(ControllerStatus),
}

impl Controller {
    /// Create a controller, loading persisted state from `store`
    pub fn new(
        settings: ControllerSettings,
        desired: DesiredConfig,
        ctx: Context,
        store: Box<dyn StateStore>,
    ) -> Result<Self, Error> {
        let state = store.load()?;
        debug!(kind = ?state.workload_kind, "loaded controller state");

        Ok(Self {
            settings,
            desired,
            ctx,
            store,
            engine: TemplateEngine::new(),
            state,
            status: ControllerStatus::maintenance(messages::WAITING_FOR_SUPERVISOR),
        })
    }

    /// Current status
    pub fn status(&self) -> &ControllerStatus {
        &self.status
    }

    /// Memoized workload kind
    pub fn workload_kind(&self) -> Option<WorkloadKind> {
        self.state.workload_kind
    }

    /// What was last applied to the workload container
    pub fn applied(&self) -> &AppliedState {
        &self.state.applied
    }

    /// Replace the desired configuration; takes effect on the next pass
    pub fn set_desired_config(&mut self, desired: DesiredConfig) {
        self.desired = desired;
    }

    /// Replace the relation source; takes effect on the next pass
    pub fn set_relation_source(&mut self, relations: Arc<dyn RelationSource>) {
        self.ctx.relations = relations;
    }

    /// Run one pass for `trigger`
    #[instrument(skip_all, fields(trigger = %trigger))]
    pub async fn handle(&mut self, trigger: Trigger) -> PassOutcome {
        let mut trail = StatusTrail::new();

        let result = match self.reset_classification(&trigger) {
            Ok(()) => self.converge(&mut trail).await,
            Err(e) => Err(e),
        };

        let (status, deferred) = match result {
            Ok(PassResult::Done(status)) => (status, false),
            Ok(PassResult::Deferred(status)) => (status, true),
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "pass failed");
                translate(&e)
            }
        };

        trail.set(status.clone());
        self.status = status.clone();
        self.ctx.status_sink.publish(&status).await;

        info!(status = %status, deferred, "pass complete");
        PassOutcome {
            status,
            deferred,
            transitions: trail.into_entries(),
        }
    }

    fn reset_classification(&mut self, trigger: &Trigger) -> Result<(), Error> {
        if !trigger.resets_classification() || self.state.workload_kind.is_none() {
            return Ok(());
        }
        debug!(previous = ?self.state.workload_kind, "forgetting workload kind");
        self.state.workload_kind = None;
        self.store.save(&self.state)
    }

    async fn converge(&mut self, trail: &mut StatusTrail) -> Result<PassResult, Error> {
        let report = Guard::new(
            self.ctx.relations.as_ref(),
            self.ctx.supervisor.as_ref(),
            &self.settings.metadata_path,
        )
        .check(self.state.workload_kind)
        .await;

        if let Some(kind) = report.classified {
            info!(kind = %kind, "workload classified");
            self.state.workload_kind = Some(kind);
            self.store.save(&self.state)?;
        }

        match report.precondition {
            Precondition::Proceed => {}
            Precondition::Defer(status) => return Ok(PassResult::Deferred(status)),
            Precondition::Block(status) => return Ok(PassResult::Done(status)),
        }

        let globals = aggregate(self.ctx.relations.as_ref(), &self.settings.unit_name)?;
        let status = Reconciler::new(&self.settings, self.ctx.supervisor.as_ref(), &self.engine)
            .reconcile(
                &self.desired,
                &globals,
                &mut self.state,
                self.store.as_mut(),
                trail,
            )
            .await?;

        Ok(PassResult::Done(status))
    }

    /// Template globals as the next pass would see them
    pub fn template_globals(&self) -> Result<TemplateGlobals, Error> {
        aggregate(self.ctx.relations.as_ref(), &self.settings.unit_name)
    }

    /// Render an ad-hoc template against the current globals
    pub fn evaluate_template(&self, template: &str) -> Result<String, Error> {
        let globals = self.template_globals()?;
        self.engine.render(template, &globals).map_err(|e| {
            Error::render("template", format!("Cannot evaluate template: {}", e), e)
        })
    }

    /// The current globals as JSON
    pub fn dump_globals(&self) -> Result<serde_json::Value, Error> {
        Ok(self.template_globals()?.to_json())
    }

    /// Render the desired configuration without touching the container
    pub fn render_desired(&self) -> Result<RenderedState, Error> {
        let globals = self.template_globals()?;
        Reconciler::new(&self.settings, self.ctx.supervisor.as_ref(), &self.engine)
            .render(&self.desired, &globals)
    }
}
