//! Version-control collaborator used to baseline and diff the workspace.
//!
//! Identity is passed to every `git` invocation through that child's
//! environment. The runner never mutates its own process environment.

use std::path::Path;
use std::process::{Command, Output};

use crate::domain::error::{ObserverError, Result};

/// Author and committer identity for runner-made commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

impl Default for GitIdentity {
    fn default() -> Self {
        Self {
            name: "runner".to_string(),
            email: "runner@local".to_string(),
        }
    }
}

/// Snapshot/diff operations the assembler needs from version control.
pub trait VersionControl {
    /// Initialise a repository in `dir` (idempotent).
    fn init(&self, dir: &Path) -> Result<()>;

    /// Stage every change, including untracked and deleted files.
    fn stage_all(&self, dir: &Path) -> Result<()>;

    /// Commit the index. Returns `false` when git refuses the commit.
    fn commit(&self, dir: &Path, message: &str, allow_empty: bool) -> Result<bool>;

    /// Unified diff of the index against `HEAD`.
    fn diff_staged(&self, dir: &Path) -> Result<String>;

    /// Commit id of `HEAD`.
    fn head(&self, dir: &Path) -> Result<String>;
}

/// [`VersionControl`] backed by the `git` executable.
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    identity: GitIdentity,
}

impl GitCli {
    pub fn new(identity: GitIdentity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &GitIdentity {
        &self.identity
    }

    fn run(&self, dir: &Path, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(["-c", "commit.gpgsign=false", "-c", "core.quotepath=false"])
            .args(args)
            .current_dir(dir)
            .env("GIT_AUTHOR_NAME", &self.identity.name)
            .env("GIT_AUTHOR_EMAIL", &self.identity.email)
            .env("GIT_COMMITTER_NAME", &self.identity.name)
            .env("GIT_COMMITTER_EMAIL", &self.identity.email)
            .output()
            .map_err(|e| ObserverError::GitError(format!("failed to run git: {e}")))
    }

    fn run_checked(&self, dir: &Path, args: &[&str]) -> Result<Output> {
        let output = self.run(dir, args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ObserverError::GitError(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(output)
    }
}

impl VersionControl for GitCli {
    fn init(&self, dir: &Path) -> Result<()> {
        self.run_checked(dir, &["init", "--quiet"])?;
        Ok(())
    }

    fn stage_all(&self, dir: &Path) -> Result<()> {
        self.run_checked(dir, &["add", "-A"])?;
        Ok(())
    }

    fn commit(&self, dir: &Path, message: &str, allow_empty: bool) -> Result<bool> {
        let mut args = vec!["commit", "--quiet", "-m", message];
        if allow_empty {
            args.push("--allow-empty");
        }
        Ok(self.run(dir, &args)?.status.success())
    }

    fn diff_staged(&self, dir: &Path) -> Result<String> {
        let output = self.run_checked(dir, &["diff", "--cached", "--no-color"])?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn head(&self, dir: &Path) -> Result<String> {
        let output = self.run_checked(dir, &["rev-parse", "HEAD"])?;
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if sha.is_empty() {
            return Err(ObserverError::GitError(
                "git rev-parse HEAD returned empty output".to_string(),
            ));
        }
        Ok(sha)
    }
}
