//! Run directory layout and persistence.
//!
//! Layout for one run:
//!
//! ```text
//! <runs_root>/<run_id>/workspace/
//! <runs_root>/<run_id>/artifacts/claude_stdout.txt
//! <runs_root>/<run_id>/artifacts/claude_stderr.txt
//! <runs_root>/<run_id>/artifacts/fs_diff.patch
//! <runs_root>/<run_id>/events.jsonl
//! ```
//!
//! `events.jsonl` is written once, after the terminal event, through a temp
//! file in the run directory that is then renamed into place.

use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::domain::{Event, ObserverError, Result};
use crate::hashing::{hash_bytes, hash_file, ContentId};

pub const WORKSPACE_DIR: &str = "workspace";
pub const ARTIFACTS_DIR: &str = "artifacts";
pub const EVENTS_FILE: &str = "events.jsonl";
pub const STDOUT_FILE: &str = "claude_stdout.txt";
pub const STDERR_FILE: &str = "claude_stderr.txt";
pub const DIFF_FILE: &str = "fs_diff.patch";

/// Deterministic paths of one run, derived from the runs root and run id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    pub run_dir: PathBuf,
    pub workspace_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub events_path: PathBuf,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    pub diff_path: PathBuf,
}

impl RunLayout {
    pub fn new(runs_root: &Path, run_id: Uuid) -> Self {
        let run_dir = runs_root.join(run_id.to_string());
        let artifacts_dir = run_dir.join(ARTIFACTS_DIR);
        Self {
            workspace_dir: run_dir.join(WORKSPACE_DIR),
            events_path: run_dir.join(EVENTS_FILE),
            stdout_path: artifacts_dir.join(STDOUT_FILE),
            stderr_path: artifacts_dir.join(STDERR_FILE),
            diff_path: artifacts_dir.join(DIFF_FILE),
            artifacts_dir,
            run_dir,
        }
    }

    /// Create the run and artifacts directories. The workspace is left to
    /// workspace preparation.
    pub fn create_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.run_dir)?;
        fs::create_dir_all(&self.artifacts_dir)?;
        Ok(())
    }

    /// `artifacts/<file>` as recorded in an artifact's `content_ref`.
    pub fn artifact_ref(file: &str) -> String {
        format!("{ARTIFACTS_DIR}/{file}")
    }
}

/// Write `text` to `path` (created even when empty) and return the content
/// identifier of the bytes written.
pub fn write_text_artifact(path: &Path, text: &str) -> Result<ContentId> {
    fs::write(path, text.as_bytes())?;
    Ok(hash_bytes(text.as_bytes()))
}

/// Serialize `events` as one JSON object per line, in order.
pub fn write_events(path: &Path, events: &[Event]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        for event in events {
            serde_json::to_writer(&mut writer, event)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Parse `events.jsonl` back into typed events. Blank lines are skipped.
pub fn read_events(path: &Path) -> Result<Vec<Event>> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: Event = serde_json::from_str(&line).map_err(|source| {
            ObserverError::MalformedEvent {
                line: idx + 1,
                source,
            }
        })?;
        events.push(event);
    }
    Ok(events)
}

/// Re-hash every file artifact referenced by `events` and compare against
/// the recorded identifier. Returns the number of artifacts checked.
///
/// References without a `content_ref`, or carrying a sentinel hash, are
/// skipped.
pub fn verify_artifacts(run_dir: &Path, events: &[Event]) -> Result<usize> {
    let mut checked = 0;
    let artifacts = events
        .iter()
        .flat_map(|e| e.agent_action.artifacts.iter())
        .filter(|a| a.hash.is_digest());
    for artifact in artifacts {
        let Some(content_ref) = artifact.content_ref.as_deref() else {
            continue;
        };
        let path = run_dir.join(content_ref);
        let actual = hash_file(&path)?;
        if actual != artifact.hash {
            return Err(ObserverError::DigestMismatch {
                path,
                expected: artifact.hash.to_string(),
                actual: actual.to_string(),
            });
        }
        checked += 1;
    }
    Ok(checked)
}
