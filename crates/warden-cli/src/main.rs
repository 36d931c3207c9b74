//! Warden CLI
//!
//! Operator tooling for the Warden sidecar controller.

use clap::Parser;
use warden_common::telemetry::{init_telemetry, TelemetryConfig};

use warden_cli::{Cli, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        json: cli.json_logs,
        ..Default::default()
    })?;

    cli.run().await
}
