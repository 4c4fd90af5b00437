//! Observer Runner - black-box observation of one coding-agent run.
//!
//! Prepares an isolated workspace under `<runs-root>/<run_id>/`, launches the
//! agent with the prompt, and writes `events.jsonl` plus captured artifacts.
//! Exits 0 whenever the run completes, whatever the agent's own exit code.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;

use observer_core::{LogFormat, RunAssembler, RunReport, RunnerConfig};

#[derive(Parser, Debug)]
#[command(name = "observer-runner")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Black-box Observer Runner for Claude Code CLI", long_about = None)]
struct Cli {
    /// The prompt to send to the agent
    prompt: String,

    /// Scenario identifier
    #[arg(long, default_value = "default")]
    scenario_id: String,

    /// Directory to copy as workspace (empty if omitted)
    #[arg(long)]
    workspace_source: Option<PathBuf>,

    /// Root directory for run outputs
    #[arg(long, default_value = "runs")]
    runs_root: PathBuf,

    /// Agent CLI command
    #[arg(long, env = "CLAUDE_CMD", default_value = "claude")]
    claude_cmd: String,

    /// Enable verbose mode on the agent CLI
    #[arg(long)]
    verbose: bool,

    /// Wall-clock limit for the agent process, in seconds
    #[arg(long, default_value = "300")]
    timeout_secs: u64,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            scenario_id: self.scenario_id.clone(),
            workspace_source: self.workspace_source.clone(),
            runs_root: self.runs_root.clone(),
            agent_cmd: self.claude_cmd.clone(),
            verbose: self.verbose,
            agent_timeout: Duration::from_secs(self.timeout_secs),
            ..RunnerConfig::default()
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    observer_core::init_tracing(LogFormat::from_json_flag(cli.log_json), Level::INFO);

    let assembler = RunAssembler::from_config(cli.runner_config());
    let report = assembler
        .run(&cli.prompt)
        .await
        .with_context(|| format!("Failed to record run under {}", cli.runs_root.display()))?;

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &RunReport) {
    let layout = &report.layout;
    println!("Run completed: {}", layout.run_dir.display());
    println!(
        "  events:    {}  ({} events)",
        layout.events_path.display(),
        report.event_count
    );
    println!("  stdout:    {}", layout.stdout_path.display());
    println!("  stderr:    {}", layout.stderr_path.display());
    println!("  diff:      {}", layout.diff_path.display());
    println!("  exit_code: {}", report.exit_code);
    println!("  duration:  {}ms", report.duration_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_surface() {
        let cli = Cli::try_parse_from(["observer-runner", "add a test"]).unwrap();
        assert_eq!(cli.prompt, "add a test");
        assert_eq!(cli.scenario_id, "default");
        assert_eq!(cli.runs_root, PathBuf::from("runs"));
        assert!(cli.workspace_source.is_none());
        assert!(!cli.verbose);
        assert_eq!(cli.timeout_secs, 300);

        let cfg = cli.runner_config();
        assert_eq!(cfg.agent_timeout, Duration::from_secs(300));
        assert_eq!(cfg.git_identity.name, "runner");
    }

    #[test]
    fn flags_map_onto_runner_config() {
        let cli = Cli::try_parse_from([
            "observer-runner",
            "--scenario-id",
            "s-42",
            "--workspace-source",
            "fixtures/repo",
            "--runs-root",
            "/tmp/runs",
            "--claude-cmd",
            "/opt/agent",
            "--verbose",
            "--timeout-secs",
            "5",
            "fix the bug",
        ])
        .unwrap();

        let cfg = cli.runner_config();
        assert_eq!(cfg.scenario_id, "s-42");
        assert_eq!(cfg.workspace_source, Some(PathBuf::from("fixtures/repo")));
        assert_eq!(cfg.runs_root, PathBuf::from("/tmp/runs"));
        assert_eq!(cfg.agent_cmd, "/opt/agent");
        assert!(cfg.verbose);
        assert_eq!(cfg.agent_timeout, Duration::from_secs(5));
    }

    #[test]
    fn prompt_is_required() {
        assert!(Cli::try_parse_from(["observer-runner"]).is_err());
    }
}
