use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

/// Where a JSON report lands. A directory, or a path ending with a
/// separator, receives `streamguard_<stamp>.json`; anything else is the file
/// itself. Missing directories are created.
pub fn resolve_output_path(target: &Path, stamp: &str) -> Result<PathBuf> {
    let filename = format!("streamguard_{stamp}.json");
    let raw = target.to_string_lossy();
    let wants_dir = raw.ends_with('/') || raw.ends_with('\\');

    if target.is_dir() {
        return Ok(target.join(filename));
    }
    if wants_dir {
        fs::create_dir_all(target)
            .with_context(|| format!("Failed to create directory: {}", target.display()))?;
        return Ok(target.join(filename));
    }
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    Ok(target.to_path_buf())
}

pub fn write_report(target: &Path, stamp: &str, json: &str) -> Result<PathBuf> {
    let path = resolve_output_path(target, stamp)?;
    fs::write(&path, json)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(path)
}
