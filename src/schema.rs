use serde::{Deserialize, Serialize};

/// Version of the device metadata JSON layout.
pub const METADATA_SCHEMA_VERSION: u32 = 1;

/// One measured problem size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingRecord {
    pub size: usize,
    pub cpu_seconds: f64,
    /// `None` when the accelerator was not measured for this run.
    pub accelerator_seconds: Option<f64>,
}

/// What the accelerator reports about itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceInfo {
    pub name: String,
    pub memory_bytes: Option<u64>,
    pub runtime_version: Option<String>,
    pub library_version: Option<String>,
}

/// Device metadata record, serialized as a flat JSON object.
///
/// Optional fields are omitted from the JSON rather than written as `null`.
/// When `available` is false only `schema_version`, `available` and possibly
/// `error` are present; construct through [`DeviceMetadata::unavailable`] and
/// [`DeviceMetadata::from_device`] to keep that shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub schema_version: u32,
    pub available: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_megabytes: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeviceMetadata {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            schema_version: METADATA_SCHEMA_VERSION,
            available: false,
            device_name: None,
            memory_megabytes: None,
            runtime_version: None,
            library_version: None,
            error: (!reason.is_empty()).then_some(reason),
        }
    }

    pub fn from_device(info: DeviceInfo) -> Self {
        Self {
            schema_version: METADATA_SCHEMA_VERSION,
            available: true,
            device_name: Some(info.name),
            memory_megabytes: info.memory_bytes.map(bytes_to_megabytes),
            runtime_version: non_empty(info.runtime_version),
            library_version: non_empty(info.library_version),
            error: None,
        }
    }
}

/// Whole megabytes (MiB), rounded down.
pub fn bytes_to_megabytes(bytes: u64) -> u64 {
    bytes / (1024 * 1024)
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
