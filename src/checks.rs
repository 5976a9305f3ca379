//! Acceptance checks on pipeline output.
//!
//! Each check looks at the artifacts on disk by itself; none depends on the
//! outcome of another.

use crate::artifact;
use crate::config::ArtifactPaths;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

impl CheckOutcome {
    fn from_result(name: &'static str, result: Result<String, String>) -> Self {
        match result {
            Ok(detail) => Self {
                name,
                passed: true,
                detail,
            },
            Err(detail) => Self {
                name,
                passed: false,
                detail,
            },
        }
    }
}

fn file_exists(path: &Path) -> Result<String, String> {
    if path.is_file() {
        Ok(format!("{} exists", path.display()))
    } else {
        Err(format!("{} should exist", path.display()))
    }
}

fn metadata_object(path: &Path) -> Result<serde_json::Map<String, Value>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    match serde_json::from_str(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(format!("{} is not a JSON object", path.display())),
        Err(e) => Err(format!("{} is not valid JSON: {e}", path.display())),
    }
}

fn has_available_flag(path: &Path) -> Result<String, String> {
    match metadata_object(path)?.get("available") {
        Some(Value::Bool(b)) => Ok(format!("available = {b}")),
        Some(other) => Err(format!("available must be a boolean, found {other}")),
        None => Err("GPU metadata must include available".to_string()),
    }
}

fn names_device_when_available(path: &Path) -> Result<String, String> {
    let obj = metadata_object(path)?;
    if obj.get("available") != Some(&Value::Bool(true)) {
        return Ok("no device to name".to_string());
    }
    match obj.get("device_name") {
        Some(Value::String(name)) if !name.is_empty() => Ok(format!("device_name = {name}")),
        _ => Err("available GPU metadata must include device_name".to_string()),
    }
}

/// Runs every check against `paths`.
pub fn run_checks(paths: &ArtifactPaths) -> Vec<CheckOutcome> {
    vec![
        CheckOutcome::from_result("results_table_exists", file_exists(&paths.results)),
        CheckOutcome::from_result("device_metadata_exists", file_exists(&paths.metadata)),
        CheckOutcome::from_result("chart_image_exists", file_exists(&paths.chart)),
        CheckOutcome::from_result(
            "metadata_has_available_flag",
            has_available_flag(&paths.metadata),
        ),
        CheckOutcome::from_result(
            "metadata_names_device_when_available",
            names_device_when_available(&paths.metadata),
        ),
    ]
}

pub fn all_passed(outcomes: &[CheckOutcome]) -> bool {
    outcomes.iter().all(|o| o.passed)
}

/// Outcomes as pretty JSON.
pub fn encode(outcomes: &[CheckOutcome]) -> crate::Result<String> {
    Ok(serde_json::to_string_pretty(outcomes)?)
}

/// Replaces `path` with the JSON outcomes.
pub fn write_outcomes(path: &Path, outcomes: &[CheckOutcome]) -> crate::Result<()> {
    let mut json = encode(outcomes)?;
    json.push('\n');
    artifact::write_atomic(path, json.as_bytes())
}
