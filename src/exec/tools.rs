// src/exec/tools.rs

//! `PATH` lookup for external tools a pipeline depends on.

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{Result, RunwireError};

/// Locate `tool` on `PATH`. Paths containing a separator are checked as-is.
pub fn find_on_path(tool: &str) -> Option<PathBuf> {
    if tool.is_empty() {
        return None;
    }

    let direct = Path::new(tool);
    if direct.components().count() > 1 {
        return is_executable(direct).then(|| direct.to_path_buf());
    }

    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .flat_map(|dir| candidates(&dir, tool))
        .find(|candidate| is_executable(candidate))
}

/// Fail with a dependency error if `tool` is not available.
pub fn require_tool(tool: &str, install_hint: Option<&str>) -> Result<PathBuf> {
    match find_on_path(tool) {
        Some(path) => {
            debug!(tool, path = %path.display(), "required tool found");
            Ok(path)
        }
        None => Err(RunwireError::Dependency {
            tool: tool.to_string(),
            install_hint: install_hint.map(str::to_string),
        }),
    }
}

#[cfg(windows)]
fn candidates(dir: &Path, tool: &str) -> Vec<PathBuf> {
    let exts = env::var("PATHEXT").unwrap_or_else(|_| ".EXE;.CMD;.BAT".to_string());
    std::iter::once(dir.join(tool))
        .chain(exts.split(';').map(|ext| dir.join(format!("{tool}{ext}"))))
        .collect()
}

#[cfg(not(windows))]
fn candidates(dir: &Path, tool: &str) -> Vec<PathBuf> {
    vec![dir.join(tool)]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
