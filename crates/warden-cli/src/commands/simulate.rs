//! Simulate command
//!
//! Runs one full controller pass against an in-memory workload container
//! seeded with a launch descriptor, and reports what the controller would
//! do to a real one.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, ValueEnum};
use serde::Serialize;
use warden_common::CNB_METADATA_PATH;
use warden_controller::relations::StaticRelations;
use warden_controller::store::{JsonFileStore, MemoryStore, StateStore};
use warden_controller::supervisor::{InMemorySupervisor, SupervisorCall};
use warden_controller::{
    Context, Controller, ControllerSettings, ControllerStatus, DesiredConfig, Trigger,
    WorkloadKind,
};

use super::{encode, OutputFormat, RelationArgs};
use crate::Result;

/// Triggers that can be simulated
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TriggerArg {
    #[default]
    Start,
    WorkloadReady,
    ConfigChanged,
    UpdateStatus,
    Upgrade,
}

impl From<TriggerArg> for Trigger {
    fn from(arg: TriggerArg) -> Self {
        match arg {
            TriggerArg::Start => Trigger::Start,
            TriggerArg::WorkloadReady => Trigger::WorkloadReady,
            TriggerArg::ConfigChanged => Trigger::ConfigChanged,
            TriggerArg::UpdateStatus => Trigger::UpdateStatus,
            TriggerArg::Upgrade => Trigger::Upgrade,
        }
    }
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Desired configuration (YAML or JSON) with `environment` and `files`
    #[arg(long, short = 'c')]
    pub config: PathBuf,

    #[command(flatten)]
    pub source: RelationArgs,

    /// Launch descriptor to place in the container; omit to simulate an image
    /// not built with buildpacks
    #[arg(long, short = 'm')]
    pub metadata: Option<PathBuf>,

    /// Persist controller state in this JSON file between runs
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Trigger to deliver
    #[arg(long, value_enum, default_value_t = TriggerArg::Start)]
    pub trigger: TriggerArg,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

#[derive(Serialize, Debug)]
struct SimulationReport {
    status: ControllerStatus,
    deferred: bool,
    transitions: Vec<ControllerStatus>,
    workload_kind: Option<WorkloadKind>,
    environment: BTreeMap<String, String>,
    actions: Vec<String>,
}

pub async fn run(args: SimulateArgs) -> Result<()> {
    let report = simulate(&args).await?;
    println!("{}", encode(&report, args.format)?);
    Ok(())
}

async fn simulate(args: &SimulateArgs) -> Result<SimulationReport> {
    let desired = DesiredConfig::load(&args.config)?;
    let relations = StaticRelations::load(&args.source.relations)?;

    let mut supervisor = InMemorySupervisor::new();
    if let Some(metadata) = &args.metadata {
        supervisor = supervisor.with_file(CNB_METADATA_PATH, std::fs::read(metadata)?);
    }
    let supervisor = Arc::new(supervisor);

    let store: Box<dyn StateStore> = match &args.state {
        Some(path) => Box::new(JsonFileStore::new(path)),
        None => Box::new(MemoryStore::new()),
    };

    let mut controller = Controller::new(
        ControllerSettings::for_unit(args.source.unit.clone()),
        desired,
        Context::new(supervisor.clone(), Arc::new(relations)),
        store,
    )?;
    let outcome = controller.handle(args.trigger.into()).await;

    let actions = supervisor
        .calls()
        .await
        .into_iter()
        .map(|call| match call {
            SupervisorCall::Push(path) => format!("push {}", path),
            SupervisorCall::AddLayer(name) => format!("add-layer {}", name),
            SupervisorCall::Start(service) => format!("start {}", service),
            SupervisorCall::Stop(service) => format!("stop {}", service),
        })
        .collect();

    Ok(SimulationReport {
        status: outcome.status,
        deferred: outcome.deferred,
        transitions: outcome.transitions,
        workload_kind: controller.workload_kind(),
        environment: controller.applied().current_environment.clone(),
        actions,
    })
}
