//! Workspace materialisation.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::Result;

/// Where the workspace contents came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceOrigin {
    Copy,
    Empty,
}

impl WorkspaceOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceOrigin::Copy => "copy",
            WorkspaceOrigin::Empty => "empty",
        }
    }
}

/// Copy `source` into `workspace` when it is an existing directory,
/// otherwise create `workspace` empty.
pub fn prepare_workspace(source: Option<&Path>, workspace: &Path) -> Result<WorkspaceOrigin> {
    match source {
        Some(src) if src.is_dir() => {
            copy_tree(src, workspace)?;
            Ok(WorkspaceOrigin::Copy)
        }
        _ => {
            fs::create_dir_all(workspace)?;
            Ok(WorkspaceOrigin::Empty)
        }
    }
}

/// Recursively copy `src` into `dst`. Symlinks are recreated, not followed.
fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in walkdir::WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(path: &Path, target: &Path) -> Result<()> {
    let link = fs::read_link(path)?;
    std::os::unix::fs::symlink(link, target)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(path: &Path, target: &Path) -> Result<()> {
    if path.is_file() {
        fs::copy(path, target)?;
    }
    Ok(())
}
