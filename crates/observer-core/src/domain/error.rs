//! Domain-level error taxonomy for the observer.
//!
//! Only conditions that prevent the durable run record from being produced
//! surface here. Agent failures and version-control hiccups are recorded as
//! event data instead.

use std::path::PathBuf;

use uuid::Uuid;

/// Errors raised while appending to a trace.
#[derive(Debug, thiserror::Error)]
pub enum CausalityError {
    #[error("trace already has a root span {existing}")]
    DuplicateRoot { existing: Uuid },

    #[error("first event of a trace must be a root, got parent {parent}")]
    MissingRoot { parent: Uuid },

    #[error("parent span {parent} of span {span} was not emitted earlier in the trace")]
    UnknownParent { span: Uuid, parent: Uuid },

    #[error("span {span} belongs to trace {actual}, expected {expected}")]
    ForeignTrace {
        span: Uuid,
        expected: Uuid,
        actual: Uuid,
    },

    #[error("span id {span} appears more than once")]
    DuplicateSpan { span: Uuid },
}

/// Observer errors.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    #[error("git error: {0}")]
    GitError(String),

    #[error("trace causality violated: {0}")]
    Causality(#[from] CausalityError),

    #[error("snapshots taken against different roots: {left} vs {right}")]
    SnapshotRootMismatch { left: PathBuf, right: PathBuf },

    #[error("digest mismatch for {path}: expected {expected}, got {actual}")]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("malformed event on line {line}: {source}")]
    MalformedEvent {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for observer operations.
pub type Result<T> = std::result::Result<T, ObserverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_mismatch_error() {
        let err = ObserverError::DigestMismatch {
            path: PathBuf::from("artifacts/fs_diff.patch"),
            expected: "sha256:abc123".to_string(),
            actual: "sha256:def456".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("fs_diff.patch"));
        assert!(msg.contains("abc123"));
        assert!(msg.contains("def456"));
    }

    #[test]
    fn test_causality_error_wraps() {
        let span = Uuid::new_v4();
        let parent = Uuid::new_v4();
        let err: ObserverError = CausalityError::UnknownParent { span, parent }.into();
        let msg = err.to_string();
        assert!(msg.contains("causality"));
        assert!(msg.contains(&parent.to_string()));
    }

    #[test]
    fn test_git_error() {
        let err = ObserverError::GitError("git init failed".to_string());
        assert!(err.to_string().contains("git error"));
    }
}
