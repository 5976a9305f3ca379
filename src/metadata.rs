//! Device metadata collector.

use crate::accel::{self, Capability};
use crate::artifact;
use crate::error::{PipelineError, Result};
use crate::schema::DeviceMetadata;
use log::warn;
use std::path::Path;

/// Builds the metadata record for `capability`. Never fails: every problem
/// ends up in the record's `error` field with `available: false`.
pub fn collect(capability: &Capability) -> DeviceMetadata {
    match capability {
        Capability::Unavailable(reason) => DeviceMetadata::unavailable(reason.clone()),
        Capability::Available(acc) => match accel::identify(acc.as_ref()) {
            Ok(info) => DeviceMetadata::from_device(info),
            Err(e) => {
                warn!("device probe failed: {e}");
                DeviceMetadata::unavailable(e.to_string())
            }
        },
    }
}

/// Pretty JSON with a trailing newline; byte-identical for equal records.
pub fn encode(meta: &DeviceMetadata) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(meta)?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn write_metadata(path: &Path, meta: &DeviceMetadata) -> Result<()> {
    artifact::write_atomic(path, &encode(meta)?)
}

pub fn read_metadata(path: &Path) -> Result<DeviceMetadata> {
    let bytes = std::fs::read(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Collects and replaces the metadata record at `path`.
pub fn collect_and_write(capability: &Capability, path: &Path) -> Result<DeviceMetadata> {
    let meta = collect(capability);
    write_metadata(path, &meta)?;
    Ok(meta)
}
