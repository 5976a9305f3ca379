//! Whole-file replacement of pipeline artifacts.
//!
//! Every stage writes its output into a temp file next to the target and
//! renames it over the old artifact, so readers never see a truncated file.

use crate::error::{PipelineError, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Directory that will hold `path`, created if missing.
fn ensure_parent(path: &Path) -> Result<&Path> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    Ok(parent)
}

/// Creates a temp file in the target's directory, keeping the target's
/// extension so format-sniffing writers (the PNG encoder) pick the right codec.
pub fn staging_file(path: &Path) -> Result<NamedTempFile> {
    let parent = ensure_parent(path)?;
    let suffix = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    tempfile::Builder::new()
        .prefix(".staging-")
        .suffix(&suffix)
        .tempfile_in(parent)
        .map_err(|e| PipelineError::io(parent, e))
}

/// Atomically moves a staged file over `path`.
pub fn commit(staged: NamedTempFile, path: &Path) -> Result<()> {
    staged
        .persist(path)
        .map_err(|e| PipelineError::io(path, e.error))?;
    Ok(())
}

/// Replaces `path` with `bytes`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut staged = staging_file(path)?;
    if let Err(e) = staged.write_all(bytes).and_then(|_| staged.flush()) {
        return Err(PipelineError::io(staged.path(), e));
    }
    commit(staged, path)
}
