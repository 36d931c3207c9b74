//! Classify command

use std::path::{Path, PathBuf};

use clap::Args;
use warden_controller::workload::LaunchMetadata;
use warden_controller::WorkloadKind;

use crate::{Error, Result};

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Launch descriptor (`/layers/config/metadata.toml` copied out of the image)
    pub metadata: PathBuf,
}

pub async fn run(args: ClassifyArgs) -> Result<()> {
    println!("{}", classify_file(&args.metadata)?);
    Ok(())
}

fn classify_file(path: &Path) -> Result<WorkloadKind> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(WorkloadKind::NotPackaged)
        }
        Err(e) => return Err(e.into()),
    };

    let metadata = LaunchMetadata::parse(&content).map_err(|e| Error::InvalidDescriptor {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(metadata.workload_kind())
}
