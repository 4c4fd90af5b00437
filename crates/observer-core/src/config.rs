//! Runner configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::agent::DEFAULT_AGENT_TIMEOUT;
use crate::git::GitIdentity;

/// Everything one observed run needs besides the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Scenario identifier, recorded as the session id.
    pub scenario_id: String,
    /// Directory copied into the workspace. Missing or `None` means empty.
    pub workspace_source: Option<PathBuf>,
    /// Parent of every run directory.
    pub runs_root: PathBuf,
    /// Agent executable.
    pub agent_cmd: String,
    /// Pass `--verbose` to the agent.
    pub verbose: bool,
    /// Wall-clock budget for the agent process.
    pub agent_timeout: Duration,
    /// Identity for runner-made commits in the workspace.
    pub git_identity: GitIdentity,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            scenario_id: "default".to_string(),
            workspace_source: None,
            runs_root: PathBuf::from("runs"),
            agent_cmd: "claude".to_string(),
            verbose: false,
            agent_timeout: DEFAULT_AGENT_TIMEOUT,
            git_identity: GitIdentity::default(),
        }
    }
}
