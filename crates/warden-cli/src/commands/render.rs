//! Render command

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use warden_controller::DesiredConfig;

use super::{encode, offline_controller, OutputFormat, RelationArgs};
use crate::Result;

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Desired configuration (YAML or JSON) with `environment` and `files`
    #[arg(long, short = 'c')]
    pub config: PathBuf,

    #[command(flatten)]
    pub source: RelationArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

#[derive(Serialize, Debug)]
struct RenderOutput {
    environment: BTreeMap<String, String>,
    files: BTreeMap<String, String>,
}

pub async fn run(args: RenderArgs) -> Result<()> {
    let desired = DesiredConfig::load(&args.config)?;
    let controller = offline_controller(&args.source, desired)?;
    let rendered = controller.render_desired()?;

    let output = RenderOutput {
        environment: rendered.environment,
        files: rendered.files,
    };
    println!("{}", encode(&output, args.format)?);
    Ok(())
}
