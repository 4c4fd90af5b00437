//! Workspace snapshots: relative path to content identifier.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::{ObserverError, Result};
use crate::hashing::{hash_file, ContentId};

/// Version-control metadata directory, skipped at any depth.
pub const VCS_DIR: &str = ".git";

/// Path to content identifier mapping of a directory tree at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    root: PathBuf,
    files: BTreeMap<String, ContentId>,
}

impl Snapshot {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &BTreeMap<String, ContentId> {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&ContentId> {
        self.files.get(path)
    }

    /// Paths that exist but could not be read or descended into.
    pub fn unreadable_paths(&self) -> Vec<&str> {
        self.files
            .iter()
            .filter(|(_, id)| id.is_unreadable())
            .map(|(path, _)| path.as_str())
            .collect()
    }

    /// Paths present in only one snapshot, or present in both with differing
    /// identifiers. Sorted lexicographically.
    pub fn changed_paths(&self, after: &Snapshot) -> Result<Vec<String>> {
        if self.root != after.root {
            return Err(ObserverError::SnapshotRootMismatch {
                left: self.root.clone(),
                right: after.root.clone(),
            });
        }
        Ok(changed_paths(&self.files, &after.files))
    }
}

/// Union of both key sets, filtered to entries whose identifier differs.
pub fn changed_paths(
    before: &BTreeMap<String, ContentId>,
    after: &BTreeMap<String, ContentId>,
) -> Vec<String> {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    keys.into_iter()
        .filter(|path| before.get(*path) != after.get(*path))
        .cloned()
        .collect()
}

/// Walk every regular file under `root`, skipping [`VCS_DIR`] directories.
///
/// A file or directory below `root` that cannot be read is recorded under
/// [`ContentId::unreadable`]. Only a failure to read `root` itself is an
/// error.
pub fn snapshot(root: &Path) -> Result<Snapshot> {
    let mut files = BTreeMap::new();
    let walker = walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_vcs_dir(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let Some(path) = e.path().filter(|p| *p != root).map(Path::to_path_buf) else {
                    return Err(e.into());
                };
                debug!(path = %path.display(), error = %e, "unreadable workspace path");
                files.insert(relative_key(relative_to(root, &path)), ContentId::unreadable());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let id = match hash_file(entry.path()) {
            Ok(id) => id,
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "unreadable workspace file");
                ContentId::unreadable()
            }
        };
        files.insert(relative_key(relative_to(root, entry.path())), id);
    }

    Ok(Snapshot {
        root: root.to_path_buf(),
        files,
    })
}

fn is_vcs_dir(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == VCS_DIR
}

fn relative_to<'a>(root: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}

fn relative_key(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
