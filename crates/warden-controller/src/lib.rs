//! Sidecar controller keeping a supervised workload converged
//!
//! The controller reacts to host triggers and drives the process supervisor
//! of a single workload container:
//!
//! - **Workload**: classifies the workload from its buildpack launch descriptor
//! - **Guard**: checks relations and classification before each pass
//! - **Relations**: aggregates peer data into template globals
//! - **Reconciler**: renders templates, pushes files, merges the layer, and
//!   starts or restarts the service only when needed
//! - **Status**: translates failures into operator-visible statuses
//! - **Controller**: dispatches triggers through all of the above

#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod guard;
pub mod reconciler;
pub mod relations;
pub mod status;
pub mod store;
pub mod supervisor;
pub mod workload;

pub use config::{ControllerSettings, DesiredConfig, EnvironmentTemplate, FileTemplate};
pub use controller::{Context, Controller, PassOutcome, Trigger};
pub use status::ControllerStatus;
pub use workload::WorkloadKind;
