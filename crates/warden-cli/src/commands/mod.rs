//! CLI commands

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, ValueEnum};
use serde::Serialize;
use warden_controller::relations::StaticRelations;
use warden_controller::store::MemoryStore;
use warden_controller::supervisor::InMemorySupervisor;
use warden_controller::{Context, Controller, ControllerSettings, DesiredConfig};

use crate::Result;

pub mod classify;
pub mod dump_globals;
pub mod evaluate_template;
pub mod render;
pub mod simulate;

/// Where relation data and the controller's own unit come from
#[derive(Args, Debug, Clone)]
pub struct RelationArgs {
    /// Relations snapshot (YAML or JSON) with `required` and `joined` sections
    #[arg(long, short = 'r')]
    pub relations: PathBuf,

    /// Name of the controller's own unit, excluded from unit data
    #[arg(long, env = "WARDEN_UNIT", default_value = "warden/0")]
    pub unit: String,
}

/// Output encoding for structured results
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

/// Serialize `value` in the requested format
pub fn encode<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    })
}

/// Controller over an empty in-memory container, for read-only operator actions
pub fn offline_controller(args: &RelationArgs, desired: DesiredConfig) -> Result<Controller> {
    let relations = StaticRelations::load(&args.relations)?;
    let ctx = Context::new(Arc::new(InMemorySupervisor::new()), Arc::new(relations));
    let controller = Controller::new(
        ControllerSettings::for_unit(args.unit.clone()),
        desired,
        ctx,
        Box::new(MemoryStore::new()),
    )?;
    Ok(controller)
}
