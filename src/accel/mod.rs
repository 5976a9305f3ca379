//! Accelerator capability probe.
//!
//! The probe runs once per process and yields either a handle to a working
//! device or the reason none is usable. Both the timing harness and the
//! metadata collector consume the same [`Capability`].

use crate::schema::DeviceInfo;
use crate::AcceleratorMode;
use log::{debug, info, warn};
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "nvml")]
mod nvml;
#[cfg(feature = "gpu")]
mod webgpu;

#[cfg(feature = "gpu")]
pub use webgpu::WgpuAccelerator;

/// Failures inside an accelerator backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AcceleratorError {
    #[error("accelerator initialization failed: {0}")]
    Init(String),

    #[error("device query failed: {0}")]
    Query(String),

    #[error("accelerator execution failed: {0}")]
    Execution(String),
}

/// A device able to run the timed vector addition.
pub trait Accelerator {
    /// Static facts about the device.
    fn device_info(&self) -> Result<DeviceInfo, AcceleratorError>;

    /// Computes `a + b` on the device and returns the elapsed time of the
    /// device work only: inputs are uploaded and the device synchronized
    /// before the timer starts, and the timer stops after a second
    /// synchronization.
    fn timed_add(&self, a: &[f32], b: &[f32]) -> Result<Duration, AcceleratorError>;
}

/// Outcome of probing for an accelerator.
pub enum Capability {
    Available(Box<dyn Accelerator>),
    Unavailable(String),
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Available(_) => f.write_str("Available(..)"),
            Capability::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
        }
    }
}

impl Capability {
    /// Detects the accelerator according to `mode`. Never fails.
    pub fn probe(mode: AcceleratorMode) -> Self {
        let capability = match mode {
            AcceleratorMode::Off => {
                Capability::Unavailable("accelerator disabled by configuration".to_string())
            }
            AcceleratorMode::Auto => probe_backend(),
        };
        match &capability {
            Capability::Available(_) => info!("accelerator available"),
            Capability::Unavailable(reason) => info!("accelerator unavailable: {reason}"),
        }
        capability
    }

    pub fn accelerator(&self) -> Option<&dyn Accelerator> {
        match self {
            Capability::Available(acc) => Some(acc.as_ref()),
            Capability::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }

    /// The accelerator, only if it can also identify itself. A device that
    /// cannot is recorded as unavailable in the metadata, so it is not timed.
    pub fn identified_accelerator(&self) -> Option<&dyn Accelerator> {
        let acc = self.accelerator()?;
        match identify(acc) {
            Ok(_) => Some(acc),
            Err(e) => {
                warn!("not timing the accelerator: {e}");
                None
            }
        }
    }
}

/// Device facts with a usable name, or why there are none.
pub fn identify(acc: &dyn Accelerator) -> Result<DeviceInfo, AcceleratorError> {
    let info = acc.device_info()?;
    if info.name.trim().is_empty() {
        return Err(AcceleratorError::Query(
            "device reported an empty name".to_string(),
        ));
    }
    Ok(info)
}

#[cfg(feature = "gpu")]
fn probe_backend() -> Capability {
    // Driver stacks occasionally panic during instance or adapter setup
    // (containers, missing ICDs); that is the same as no device.
    match std::panic::catch_unwind(WgpuAccelerator::new) {
        Ok(Ok(acc)) => Capability::Available(Box::new(acc)),
        Ok(Err(e)) => Capability::Unavailable(e.to_string()),
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            debug!("accelerator probe panicked: {msg}");
            Capability::Unavailable(format!("accelerator initialization panicked: {msg}"))
        }
    }
}

#[cfg(not(feature = "gpu"))]
fn probe_backend() -> Capability {
    debug!("built without the `gpu` feature");
    Capability::Unavailable("built without GPU support (enable the `gpu` feature)".to_string())
}
