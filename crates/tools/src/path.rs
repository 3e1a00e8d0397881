//! Path validation: confine file tools to the working directory.
//!
//! Relative paths resolve against the working directory. `..` components
//! are folded lexically and symlinks are resolved through the deepest
//! existing ancestor, so neither can be used to step outside.

use std::path::{Component, Path, PathBuf};

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path '{path}' is outside working directory '{working_dir}'")]
    OutsideWorkingDir { path: String, working_dir: String },

    #[error("Working directory '{working_dir}' is unavailable: {reason}")]
    WorkingDirUnavailable { working_dir: String, reason: String },
}

/// Resolve `path` inside `working_dir`.
///
/// Returns the absolute, resolved path on success. The target itself need
/// not exist (writes create it).
pub fn resolve_in_workspace(path: &str, working_dir: &str) -> Result<PathBuf, PathValidationError> {
    let base = Path::new(working_dir)
        .canonicalize()
        .map_err(|e| PathValidationError::WorkingDirUnavailable {
            working_dir: working_dir.into(),
            reason: e.to_string(),
        })?;

    let input = Path::new(path);
    let joined = if input.is_absolute() { input.to_path_buf() } else { base.join(input) };
    let resolved = resolve_existing_prefix(&normalize(&joined));

    if resolved.starts_with(&base) {
        Ok(resolved)
    } else {
        Err(PathValidationError::OutsideWorkingDir {
            path: path.into(),
            working_dir: working_dir.into(),
        })
    }
}

/// Fold `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize the deepest existing ancestor and re-append the rest.
fn resolve_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return rest.iter().rev().fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name);
                existing = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
}
