//! Observed-run state machine.
//!
//! One call to [`RunAssembler::run`] drives a run through its phases in a
//! fixed order and emits one trace event per phase:
//!
//! ```text
//! run_started                                  (root)
//! ├── workspace_prepared
//! ├── agent_invoked
//! │   └── agent_completed
//! │       ├── artifacts_captured
//! │       └── fs_diff_captured
//! │           └── commands_observation_unavailable
//! │               └── evaluation_performed
//! └── run_finished
//! ```
//!
//! Agent failures and version-control failures become event data. Only I/O
//! that prevents writing the run directory or the event log is returned as
//! an error.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

use crate::agent::{execute_agent, AgentInvocation, AgentOutcome};
use crate::config::RunnerConfig;
use crate::domain::{
    default_constraints, ActionType, ArtifactKind, ArtifactRef, Check, CheckGroup, Evaluation,
    Event, Phase, Result, TraceContext,
};
use crate::git::{GitCli, VersionControl};
use crate::hashing::ContentId;
use crate::obs;
use crate::output::{
    write_events, write_text_artifact, RunLayout, DIFF_FILE, STDERR_FILE, STDOUT_FILE,
    WORKSPACE_DIR,
};
use crate::snapshot::{snapshot, Snapshot};
use crate::trace::{validate_trace, TraceLog};
use crate::workspace::prepare_workspace;

/// Maximum number of changed paths listed in `fs_diff_captured`.
pub const MAX_REPORTED_PATHS: usize = 50;

const BASELINE_COMMIT_MESSAGE: &str = "initial";

/// Summary of a completed run, returned to the caller.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub trace_id: Uuid,
    pub layout: RunLayout,
    pub event_count: usize,
    pub exit_code: i32,
    pub duration_ms: u64,
    pub action_type: ActionType,
    pub total_changed: usize,
}

/// Drives observed runs with a fixed configuration and version-control backend.
pub struct RunAssembler<V = GitCli> {
    config: RunnerConfig,
    vcs: V,
}

impl RunAssembler<GitCli> {
    /// Assembler backed by the `git` executable, using the configured identity.
    pub fn from_config(config: RunnerConfig) -> Self {
        let vcs = GitCli::new(config.git_identity.clone());
        Self { config, vcs }
    }
}

impl<V: VersionControl> RunAssembler<V> {
    pub fn new(config: RunnerConfig, vcs: V) -> Self {
        Self { config, vcs }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Execute one observed run of the agent against `prompt`.
    ///
    /// Always reaches `run_finished` and writes `events.jsonl` unless the
    /// run directory itself cannot be produced.
    pub async fn run(&self, prompt: &str) -> Result<RunReport> {
        let ctx = TraceContext::new(self.config.scenario_id.clone());
        let span = obs::run_span(&ctx.run_id.to_string());
        self.drive(ctx, prompt).instrument(span).await
    }

    async fn drive(&self, ctx: TraceContext, prompt: &str) -> Result<RunReport> {
        let started = Instant::now();
        let layout = RunLayout::new(&self.config.runs_root, ctx.run_id);
        layout.create_dirs()?;

        let run_id = ctx.run_id.to_string();
        obs::emit_run_started(
            &run_id,
            &self.config.scenario_id,
            &layout.run_dir.display().to_string(),
        );

        let mut run = ObservedRun::new(ctx, layout);

        let root = run.run_started()?;
        let prepared = self.workspace_prepared(&mut run, root, prompt)?;

        let invocation = AgentInvocation::new(
            &self.config.agent_cmd,
            prompt,
            self.config.verbose,
            &run.layout.workspace_dir,
            self.config.agent_timeout,
        );
        let invoked = run.agent_invoked(root, &invocation, self.config.verbose)?;

        let outcome = execute_agent(&invocation).await;
        obs::emit_agent_completed(&outcome);

        let completed = run.agent_completed(invoked, &outcome)?;
        run.artifacts_captured(completed, &outcome)?;
        let (diff_span, action_type, total_changed) =
            self.fs_diff_captured(&mut run, completed, &prepared)?;
        let placeholder = run.commands_observation_unavailable(diff_span)?;
        let evaluation = run.evaluation_performed(placeholder)?;
        run.run_finished(root, &evaluation, outcome.exit_code)?;

        validate_trace(run.log.events())?;
        write_events(&run.layout.events_path, run.log.events())?;

        let duration_ms = started.elapsed().as_millis() as u64;
        obs::emit_run_finished(&run_id, duration_ms, run.log.len(), outcome.exit_code);

        Ok(RunReport {
            run_id: run.ctx.run_id,
            trace_id: run.ctx.trace_id,
            event_count: run.log.len(),
            layout: run.layout,
            exit_code: outcome.exit_code,
            duration_ms: outcome.duration_ms,
            action_type,
            total_changed,
        })
    }

    /// Materialise the workspace, baseline it in version control, and take
    /// the pre-run snapshot.
    fn workspace_prepared(
        &self,
        run: &mut ObservedRun,
        root: Uuid,
        prompt: &str,
    ) -> Result<PreparedWorkspace> {
        let workspace = run.layout.workspace_dir.clone();
        let origin = prepare_workspace(self.config.workspace_source.as_deref(), &workspace)?;

        let git_initialized = match self.vcs.init(&workspace) {
            Ok(()) => true,
            Err(e) => {
                obs::emit_vcs_degraded("init", &e);
                false
            }
        };
        let commit_ok = git_initialized && self.baseline_commit(&workspace);
        let baseline_commit = if commit_ok {
            self.vcs.head(&workspace).ok()
        } else {
            None
        };

        let baseline = snapshot(&workspace)?;

        let mut event = run.ctx.new_event(Some(root));
        event.request.user_request_raw = prompt.to_string();
        event.request.constraints = default_constraints();
        event.agent_action.action_summary = format!(
            "workspace={} git_initialized_by_runner={git_initialized}",
            origin.as_str()
        );
        event.agent_action.artifacts = vec![ArtifactRef::file(
            ArtifactKind::Metadata,
            "workspace root",
            &format!("{WORKSPACE_DIR}/"),
            ContentId::not_applicable(),
            json!({
                "workspace_root_abs": absolute(&workspace).display().to_string(),
                "workspace_origin": origin,
                "git_initialized_by_runner": git_initialized,
                "git_commit_success": commit_ok,
                "baseline_commit": baseline_commit,
                "baseline_file_count": baseline.len(),
            }),
        )];
        run.emit(event, Phase::WorkspacePrepared)?;

        Ok(PreparedWorkspace {
            git_initialized,
            baseline,
        })
    }

    fn baseline_commit(&self, workspace: &Path) -> bool {
        if let Err(e) = self.vcs.stage_all(workspace) {
            obs::emit_vcs_degraded("stage_all", &e);
        }
        match self.vcs.commit(workspace, BASELINE_COMMIT_MESSAGE, true) {
            Ok(committed) => committed,
            Err(e) => {
                obs::emit_vcs_degraded("commit", &e);
                false
            }
        }
    }

    /// Diff the workspace against its baseline, both through version control
    /// and through an independent snapshot.
    fn fs_diff_captured(
        &self,
        run: &mut ObservedRun,
        parent: Uuid,
        prepared: &PreparedWorkspace,
    ) -> Result<(Uuid, ActionType, usize)> {
        let workspace = run.layout.workspace_dir.clone();
        let diff_text = if prepared.git_initialized {
            self.staged_diff(&workspace)
        } else {
            String::new()
        };
        let diff_hash = write_text_artifact(&run.layout.diff_path, &diff_text)?;

        let after = snapshot(&workspace)?;
        let changed = prepared.baseline.changed_paths(&after)?;
        let diff_empty = diff_text.trim().is_empty();
        let action_type = if diff_empty {
            ActionType::NoOp
        } else {
            ActionType::Edit
        };

        let reported: Vec<&String> = changed.iter().take(MAX_REPORTED_PATHS).collect();

        let mut event = run.ctx.new_event(Some(parent));
        event.agent_action.action_type = action_type;
        event.agent_action.action_summary = format!(
            "{} file(s) changed{}",
            changed.len(),
            if diff_empty { " (empty diff)" } else { "" }
        );
        event.agent_action.artifacts = vec![ArtifactRef::file(
            ArtifactKind::Diff,
            DIFF_FILE,
            &RunLayout::artifact_ref(DIFF_FILE),
            diff_hash,
            json!({
                "changed_paths": reported,
                "total_changed": changed.len(),
                "unreadable_paths": after.unreadable_paths(),
                "method": "git_diff",
            }),
        )];
        let span = run.emit(event, Phase::FsDiffCaptured)?;
        Ok((span, action_type, changed.len()))
    }

    fn staged_diff(&self, workspace: &Path) -> String {
        if let Err(e) = self.vcs.stage_all(workspace) {
            obs::emit_vcs_degraded("stage_all", &e);
        }
        self.vcs.diff_staged(workspace).unwrap_or_else(|e| {
            obs::emit_vcs_degraded("diff_staged", &e);
            String::new()
        })
    }
}

struct PreparedWorkspace {
    git_initialized: bool,
    baseline: Snapshot,
}

/// Mutable state of one run: identity, layout, and the growing trace.
struct ObservedRun {
    ctx: TraceContext,
    layout: RunLayout,
    log: TraceLog,
}

impl ObservedRun {
    fn new(ctx: TraceContext, layout: RunLayout) -> Self {
        let log = TraceLog::new(ctx.trace_id);
        Self { ctx, layout, log }
    }

    fn emit(&mut self, event: Event, phase: Phase) -> Result<Uuid> {
        let span = self.log.append(event, phase)?;
        obs::emit_phase_recorded(phase, &span.to_string(), self.log.len() - 1);
        Ok(span)
    }

    fn run_started(&mut self) -> Result<Uuid> {
        let mut event = self.ctx.new_event(None);
        event.agent_action.action_summary = format!(
            "run_id={} scenario_id={}",
            self.ctx.run_id, self.ctx.session_id
        );
        self.emit(event, Phase::RunStarted)
    }

    /// Recorded before the process is launched.
    fn agent_invoked(
        &mut self,
        root: Uuid,
        invocation: &AgentInvocation,
        verbose: bool,
    ) -> Result<Uuid> {
        let cwd = invocation.cwd.display().to_string();
        let mut event = self.ctx.new_event(Some(root));
        event.agent_action.action_type = ActionType::Plan;
        event.agent_action.action_summary = format!(
            "verbose={} cwd={cwd}",
            if verbose { "yes" } else { "no" }
        );
        event.agent_action.artifacts = vec![ArtifactRef::record(
            ArtifactKind::Process,
            "claude-code invocation",
            json!({
                "cwd": cwd,
                "argv": invocation.argv,
                "timeout_secs": invocation.timeout.as_secs(),
                "start_timestamp": Utc::now(),
            }),
        )];
        self.emit(event, Phase::AgentInvoked)
    }

    fn agent_completed(&mut self, invoked: Uuid, outcome: &AgentOutcome) -> Result<Uuid> {
        let mut event = self.ctx.new_event(Some(invoked));
        event.agent_action.action_summary = format!(
            "exit_code={} duration_ms={}",
            outcome.exit_code, outcome.duration_ms
        );
        event.agent_action.artifacts = vec![ArtifactRef::record(
            ArtifactKind::Process,
            "claude-code completion",
            json!({
                "exit_code": outcome.exit_code,
                "duration_ms": outcome.duration_ms,
                "termination": outcome.termination,
            }),
        )];
        self.emit(event, Phase::AgentCompleted)
    }

    fn artifacts_captured(&mut self, completed: Uuid, outcome: &AgentOutcome) -> Result<Uuid> {
        let stdout_hash = write_text_artifact(&self.layout.stdout_path, &outcome.stdout)?;
        let stderr_hash = write_text_artifact(&self.layout.stderr_path, &outcome.stderr)?;

        let mut event = self.ctx.new_event(Some(completed));
        event.model_output.output_raw = Some("captured_as_artifact".to_string());
        event.agent_action.action_summary = "stdout and stderr captured".to_string();
        event.agent_action.artifacts = vec![
            ArtifactRef::file(
                ArtifactKind::StdoutLog,
                STDOUT_FILE,
                &RunLayout::artifact_ref(STDOUT_FILE),
                stdout_hash,
                json!({ "non_normative": true }),
            ),
            ArtifactRef::file(
                ArtifactKind::StderrLog,
                STDERR_FILE,
                &RunLayout::artifact_ref(STDERR_FILE),
                stderr_hash,
                json!({ "non_normative": true }),
            ),
        ];
        self.emit(event, Phase::ArtifactsCaptured)
    }

    /// Tool-level observation needs white-box wrappers, which black-box mode
    /// does not have.
    fn commands_observation_unavailable(&mut self, diff_span: Uuid) -> Result<Uuid> {
        let mut event = self.ctx.new_event(Some(diff_span));
        event.agent_action.action_summary =
            "wrappers disabled, command observation unavailable".to_string();
        self.emit(event, Phase::CommandsObservationUnavailable)
    }

    fn evaluation_performed(&mut self, placeholder: Uuid) -> Result<Evaluation> {
        let evaluation = Evaluation {
            quality: CheckGroup::unknown(vec![Check::indeterminate(
                "quality.tests_required",
                "command observation unavailable",
            )]),
            policy: CheckGroup::unknown(vec![
                Check::indeterminate(
                    "scope.no_ci_changes",
                    format!("diff artifact ref: {}", RunLayout::artifact_ref(DIFF_FILE)),
                ),
                Check::indeterminate(
                    "style.no_emojis",
                    format!(
                        "stdout artifact ref: {}",
                        RunLayout::artifact_ref(STDOUT_FILE)
                    ),
                ),
            ]),
            ..Evaluation::default()
        };

        let mut event = self.ctx.new_event(Some(placeholder));
        event.agent_action.action_summary = "evaluation computed from artifacts".to_string();
        event.evaluation = evaluation.clone();
        self.emit(event, Phase::EvaluationPerformed)?;
        Ok(evaluation)
    }

    /// Terminal event, parented on the root to close the trace.
    fn run_finished(&mut self, root: Uuid, evaluation: &Evaluation, exit_code: i32) -> Result<Uuid> {
        let mut event = self.ctx.new_event(Some(root));
        event.agent_action.action_summary =
            format!("{} exit_code={exit_code}", evaluation.status_line());
        self.emit(event, Phase::RunFinished)
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ObserverError;
    use crate::output::read_events;
    use std::cell::RefCell;

    /// Version control that fails every call, recording what was asked.
    #[derive(Default)]
    struct BrokenVcs {
        calls: RefCell<Vec<&'static str>>,
    }

    impl VersionControl for BrokenVcs {
        fn init(&self, _dir: &Path) -> Result<()> {
            self.calls.borrow_mut().push("init");
            Err(ObserverError::GitError("git unavailable".to_string()))
        }

        fn stage_all(&self, _dir: &Path) -> Result<()> {
            self.calls.borrow_mut().push("stage_all");
            Err(ObserverError::GitError("git unavailable".to_string()))
        }

        fn commit(&self, _dir: &Path, _message: &str, _allow_empty: bool) -> Result<bool> {
            self.calls.borrow_mut().push("commit");
            Ok(false)
        }

        fn diff_staged(&self, _dir: &Path) -> Result<String> {
            self.calls.borrow_mut().push("diff_staged");
            Err(ObserverError::GitError("git unavailable".to_string()))
        }

        fn head(&self, _dir: &Path) -> Result<String> {
            self.calls.borrow_mut().push("head");
            Err(ObserverError::GitError("git unavailable".to_string()))
        }
    }

    fn config(runs_root: &Path) -> RunnerConfig {
        RunnerConfig {
            runs_root: runs_root.to_path_buf(),
            agent_cmd: "definitely-not-an-agent-binary-7f3a".to_string(),
            ..RunnerConfig::default()
        }
    }

    #[tokio::test]
    async fn broken_version_control_degrades_without_aborting() {
        let runs = tempfile::tempdir().unwrap();
        let assembler = RunAssembler::new(config(runs.path()), BrokenVcs::default());
        let report = assembler.run("do nothing").await.unwrap();

        assert_eq!(assembler.vcs.calls.borrow().as_slice(), ["init"]);

        let events = read_events(&report.layout.events_path).unwrap();
        assert_eq!(events.len(), 9);
        let prepared = &events[1].agent_action.artifacts[0].metadata;
        assert_eq!(prepared["git_initialized_by_runner"], false);
        assert_eq!(prepared["git_commit_success"], false);
        assert!(prepared["baseline_commit"].is_null());

        let diff = &events[5];
        assert_eq!(diff.agent_action.action_type, ActionType::NoOp);
        assert_eq!(std::fs::read_to_string(&report.layout.diff_path).unwrap(), "");
    }

    #[tokio::test]
    async fn report_matches_layout() {
        let runs = tempfile::tempdir().unwrap();
        let assembler = RunAssembler::new(config(runs.path()), BrokenVcs::default());
        let report = assembler.run("prompt").await.unwrap();
        assert_eq!(
            report.layout,
            RunLayout::new(runs.path(), report.run_id)
        );
        assert_eq!(report.event_count, 9);
        assert!(report.layout.stdout_path.exists());
        assert!(report.layout.stderr_path.exists());
        assert!(report.layout.workspace_dir.is_dir());
    }
}
