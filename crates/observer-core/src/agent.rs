//! Agent subprocess execution.
//!
//! The agent is opaque: it receives an argument vector and a working
//! directory and exposes only an exit code, stdout, and stderr. Failures to
//! run it are folded into an [`AgentOutcome`] rather than returned as errors.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Exit code reported when the agent exceeds its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// Exit code reported when the agent command cannot be located or started.
pub const COMMAND_NOT_FOUND_EXIT_CODE: i32 = -127;

/// Exit code reported when the agent started but its output could not be
/// collected, so its real status is unknown.
pub const OUTPUT_LOST_EXIT_CODE: i32 = -2;

/// Default wall-clock budget for one agent invocation.
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(300);

/// How the agent invocation ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Exited,
    TimedOut,
    NotStarted,
    OutputLost,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::Exited => "exited",
            Termination::TimedOut => "timed_out",
            Termination::NotStarted => "not_started",
            Termination::OutputLost => "output_lost",
        }
    }
}

/// A fully specified agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInvocation {
    pub argv: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Duration,
}

impl AgentInvocation {
    /// `[command, ("--verbose"), "--print", prompt]`, run inside `cwd`.
    pub fn new(command: &str, prompt: &str, verbose: bool, cwd: &Path, timeout: Duration) -> Self {
        let mut argv = vec![command.to_string()];
        if verbose {
            argv.push("--verbose".to_string());
        }
        argv.push("--print".to_string());
        argv.push(prompt.to_string());
        Self {
            argv,
            cwd: cwd.to_path_buf(),
            timeout,
        }
    }

    pub fn command(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }
}

/// Observable result of an agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub termination: Termination,
}

/// Run the agent to completion, timeout, or launch failure.
///
/// Output is collected in full, not streamed. On timeout the child is killed
/// when its handle is dropped.
pub async fn execute_agent(invocation: &AgentInvocation) -> AgentOutcome {
    let start = Instant::now();
    let (exit_code, stdout, stderr, termination) = launch(invocation).await;
    AgentOutcome {
        exit_code,
        stdout,
        stderr,
        duration_ms: start.elapsed().as_millis() as u64,
        termination,
    }
}

async fn launch(invocation: &AgentInvocation) -> (i32, String, String, Termination) {
    let Some((exe, args)) = invocation.argv.split_first() else {
        return not_started("Command not found: <empty argv>".to_string());
    };

    let child = Command::new(exe)
        .args(args)
        .current_dir(&invocation.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return not_started(format!("Command not found: {exe}"));
        }
        Err(e) => return not_started(format!("Failed to start {exe}: {e}")),
    };

    match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => (
            exit_code_of(&output.status),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
            Termination::Exited,
        ),
        Ok(Err(e)) => output_lost(exe, &e),
        Err(_elapsed) => (
            TIMEOUT_EXIT_CODE,
            String::new(),
            format!("TIMEOUT after {}s", invocation.timeout.as_secs()),
            Termination::TimedOut,
        ),
    }
}

fn not_started(stderr: String) -> (i32, String, String, Termination) {
    (
        COMMAND_NOT_FOUND_EXIT_CODE,
        String::new(),
        stderr,
        Termination::NotStarted,
    )
}

fn output_lost(exe: &str, err: &std::io::Error) -> (i32, String, String, Termination) {
    (
        OUTPUT_LOST_EXIT_CODE,
        String::new(),
        format!("Failed to collect output of {exe}: {err}"),
        Termination::OutputLost,
    )
}

/// Real exit code, or `128 + signal` for signal-terminated processes.
fn exit_code_of(status: &std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    COMMAND_NOT_FOUND_EXIT_CODE
}
