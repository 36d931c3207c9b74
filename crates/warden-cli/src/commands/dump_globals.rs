//! Dump-globals command

use clap::Args;
use warden_controller::DesiredConfig;

use super::{encode, offline_controller, OutputFormat, RelationArgs};
use crate::Result;

#[derive(Args, Debug)]
pub struct DumpGlobalsArgs {
    #[command(flatten)]
    pub source: RelationArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

pub async fn run(args: DumpGlobalsArgs) -> Result<()> {
    let controller = offline_controller(&args.source, DesiredConfig::default())?;
    let globals = controller.dump_globals()?;
    println!("{}", encode(&globals, args.format)?);
    Ok(())
}
