use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub mod accel;
pub mod artifact;
pub mod checks;
pub mod config;
pub mod dataset;
pub mod error;
pub mod harness;
pub mod metadata;
pub mod pipeline;
pub mod plot;
pub mod report;
pub mod results;
pub mod schema;

pub use error::{PipelineError, Result};

/// How the accelerator capability is determined.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceleratorMode {
    /// Probe for an accelerator and use it when one is found.
    #[default]
    Auto,
    /// Never touch the accelerator; every run is CPU-only.
    Off,
}
