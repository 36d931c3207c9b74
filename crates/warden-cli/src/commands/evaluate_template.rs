//! Evaluate-template command

use clap::Args;
use warden_controller::DesiredConfig;

use super::{offline_controller, RelationArgs};
use crate::Result;

#[derive(Args, Debug)]
pub struct EvaluateTemplateArgs {
    #[command(flatten)]
    pub source: RelationArgs,

    /// Template to render, e.g. '{{ relations.consumed.mongodb.app.uri }}'
    pub template: String,
}

pub async fn run(args: EvaluateTemplateArgs) -> Result<()> {
    println!("{}", evaluate(&args)?);
    Ok(())
}

fn evaluate(args: &EvaluateTemplateArgs) -> Result<String> {
    let controller = offline_controller(&args.source, DesiredConfig::default())?;
    Ok(controller.evaluate_template(&args.template)?)
}
