//! Warden CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// Warden - sidecar controller for buildpack workloads
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true, env = "WARDEN_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a template against a relations snapshot
    EvaluateTemplate(commands::evaluate_template::EvaluateTemplateArgs),
    /// Print the template globals built from a relations snapshot
    DumpGlobals(commands::dump_globals::DumpGlobalsArgs),
    /// Classify a workload from its buildpack launch descriptor
    Classify(commands::classify::ClassifyArgs),
    /// Render a desired configuration without applying it
    Render(commands::render::RenderArgs),
    /// Run one controller pass against an in-memory workload container
    Simulate(commands::simulate::SimulateArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::EvaluateTemplate(args) => commands::evaluate_template::run(args).await,
            Commands::DumpGlobals(args) => commands::dump_globals::run(args).await,
            Commands::Classify(args) => commands::classify::run(args).await,
            Commands::Render(args) => commands::render::run(args).await,
            Commands::Simulate(args) => commands::simulate::run(args).await,
        }
    }
}
