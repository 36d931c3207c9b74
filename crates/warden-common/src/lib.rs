//! Common types for Warden: errors, templating, and telemetry

#![deny(missing_docs)]

pub mod error;
pub mod telemetry;
pub mod template;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Path of the Cloud Native Buildpacks metadata descriptor inside the workload container
pub const CNB_METADATA_PATH: &str = "/layers/config/metadata.toml";

/// Entry point of the buildpacks lifecycle that launches the `web` process
pub const CNB_LIFECYCLE_WEB_PATH: &str = "/cnb/process/web";

/// Name of the supervised workload service
pub const DEFAULT_SERVICE_NAME: &str = "application";

/// Name of the supervision layer that declares the workload service
pub const DEFAULT_LAYER_NAME: &str = "cnb_lifecycle";
