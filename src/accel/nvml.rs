//! Direct NVIDIA driver queries.
//!
//! NVML answers take precedence over the wgpu adapter info.

use crate::schema::DeviceInfo;
use log::debug;
use nvml_wrapper::error::NvmlError;
use nvml_wrapper::Nvml;

/// Facts NVML reports for one device.
#[derive(Debug, Clone)]
pub(crate) struct NvmlDevice {
    pub name: String,
    pub total_memory_bytes: Option<u64>,
    pub cuda_version: Option<String>,
    pub driver_version: Option<String>,
}

/// CUDA driver API version as `major.minor`, e.g. 12020 -> "12.2".
pub(crate) fn format_cuda_version(raw: i32) -> String {
    format!("{}.{}", raw / 1000, (raw % 1000) / 10)
}

pub(crate) fn query(index: u32) -> Result<NvmlDevice, NvmlError> {
    let nvml = Nvml::init()?;
    let device = nvml.device_by_index(index)?;
    let name = device.name()?;

    let total_memory_bytes = match device.memory_info() {
        Ok(info) => Some(info.total),
        Err(e) => {
            debug!("NVML memory query failed: {e}");
            None
        }
    };
    let cuda_version = nvml
        .sys_cuda_driver_version()
        .map(format_cuda_version)
        .map_err(|e| debug!("NVML CUDA version query failed: {e}"))
        .ok();
    let driver_version = nvml
        .sys_driver_version()
        .map_err(|e| debug!("NVML driver version query failed: {e}"))
        .ok();

    Ok(NvmlDevice {
        name,
        total_memory_bytes,
        cuda_version,
        driver_version,
    })
}

impl NvmlDevice {
    /// NVML values, with adapter values filling whatever NVML could not answer.
    pub(crate) fn merged_over(self, adapter: DeviceInfo) -> DeviceInfo {
        DeviceInfo {
            name: if self.name.trim().is_empty() {
                adapter.name
            } else {
                self.name
            },
            memory_bytes: self.total_memory_bytes.or(adapter.memory_bytes),
            runtime_version: self.cuda_version.or(adapter.runtime_version),
            library_version: self.driver_version.or(adapter.library_version),
        }
    }
}
