//! Trace event schema and the default-filled event builder.
//!
//! Every field of the schema is always present. Information that is unknown
//! at emission time uses a sentinel (`"unknown"`, `null`, an empty
//! collection) so each line of `events.jsonl` validates against one shape.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::evaluation::Evaluation;
use crate::hashing::ContentId;

pub const SCHEMA_VERSION: &str = "0.2";
pub const AGENT_ID: &str = "claude-code";
pub const UNKNOWN: &str = "unknown";

/// Lifecycle phase of an observed run, in emission order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    RunStarted,
    WorkspacePrepared,
    AgentInvoked,
    AgentCompleted,
    ArtifactsCaptured,
    FsDiffCaptured,
    CommandsObservationUnavailable,
    EvaluationPerformed,
    RunFinished,
}

impl Phase {
    pub const ALL: [Phase; 9] = [
        Phase::RunStarted,
        Phase::WorkspacePrepared,
        Phase::AgentInvoked,
        Phase::AgentCompleted,
        Phase::ArtifactsCaptured,
        Phase::FsDiffCaptured,
        Phase::CommandsObservationUnavailable,
        Phase::EvaluationPerformed,
        Phase::RunFinished,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::RunStarted => "run_started",
            Phase::WorkspacePrepared => "workspace_prepared",
            Phase::AgentInvoked => "agent_invoked",
            Phase::AgentCompleted => "agent_completed",
            Phase::ArtifactsCaptured => "artifacts_captured",
            Phase::FsDiffCaptured => "fs_diff_captured",
            Phase::CommandsObservationUnavailable => "commands_observation_unavailable",
            Phase::EvaluationPerformed => "evaluation_performed",
            Phase::RunFinished => "run_finished",
        }
    }

    /// Recover the phase from an `[<phase>] ...` action summary.
    pub fn from_summary(summary: &str) -> Option<Phase> {
        let rest = summary.strip_prefix('[')?;
        let end = rest.find(']')?;
        rest[..end].parse().ok()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown phase: {s}"))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ObservabilityMode {
    #[default]
    BlackBox,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub session_id: String,
    pub run_id: Uuid,
    pub agent_id: String,
    pub agent_version: String,
    pub environment: String,
}

/// A rule the agent was asked to respect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Constraint {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub rule: String,
}

impl Constraint {
    pub fn new(id: &str, kind: &str, rule: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            rule: rule.to_string(),
        }
    }
}

/// Constraint catalogue attached to the request when the workspace is prepared.
pub fn default_constraints() -> Vec<Constraint> {
    vec![
        Constraint::new("output.json_only", "format", "Output must be JSON only"),
        Constraint::new("style.no_emojis", "style", "No emojis in output"),
        Constraint::new(
            "scope.no_ci_changes",
            "scope",
            "Do not modify CI configuration",
        ),
        Constraint::new("quality.tests_required", "quality", "Tests must be present"),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub request_id: Uuid,
    pub user_request_raw: String,
    pub constraints: Vec<Constraint>,
    pub context: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SamplingParameters {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptProvenance {
    pub provider: String,
    pub model: String,
    pub capture_mode: String,
    pub prompt_bundle: Option<serde_json::Value>,
    pub prompt_bundle_hash: String,
    pub parameters: SamplingParameters,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelOutput {
    pub completion_id: Option<String>,
    pub output_raw: Option<String>,
    pub output_structured: Option<serde_json::Value>,
    pub tool_calls: Vec<serde_json::Value>,
    pub usage: Usage,
}

/// What the agent did, as far as a black-box observer can tell.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Plan,
    Edit,
    NoOp,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Metadata,
    Process,
    StdoutLog,
    StderrLog,
    Diff,
}

/// Pointer to something the run produced, with an integrity identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactRef {
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub id: Uuid,
    pub summary: String,
    /// Path relative to the run directory, when the artifact is a file.
    pub content_ref: Option<String>,
    pub hash: ContentId,
    pub metadata: serde_json::Value,
}

impl ArtifactRef {
    /// Record with no backing file and nothing to hash.
    pub fn record(kind: ArtifactKind, summary: &str, metadata: serde_json::Value) -> Self {
        Self {
            kind,
            id: Uuid::new_v4(),
            summary: summary.to_string(),
            content_ref: None,
            hash: ContentId::not_applicable(),
            metadata,
        }
    }

    /// File artifact under the run directory.
    pub fn file(
        kind: ArtifactKind,
        summary: &str,
        content_ref: &str,
        hash: ContentId,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            id: Uuid::new_v4(),
            summary: summary.to_string(),
            content_ref: Some(content_ref.to_string()),
            hash,
            metadata,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentAction {
    pub action_type: ActionType,
    pub action_summary: String,
    pub artifacts: Vec<ArtifactRef>,
    pub tool_results: Vec<serde_json::Value>,
}

/// One immutable record of an occurrence during a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub schema_version: String,
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub trace_id: Uuid,
    pub span_id: Uuid,
    pub parent_span_id: Option<Uuid>,
    pub observability_mode: ObservabilityMode,
    pub session: Session,
    pub request: Request,
    pub prompt_provenance: PromptProvenance,
    pub model_output: ModelOutput,
    pub agent_action: AgentAction,
    pub evaluation: Evaluation,
}

impl Event {
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// Phase encoded in the action summary prefix, once appended to a trace.
    pub fn phase(&self) -> Option<Phase> {
        Phase::from_summary(&self.agent_action.action_summary)
    }
}

/// Identity shared by every event of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: Uuid,
    pub run_id: Uuid,
    pub session_id: String,
    pub request_id: Uuid,
}

impl TraceContext {
    /// Fresh run, trace, and request ids for the given session (scenario).
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            session_id: session_id.into(),
            request_id: Uuid::new_v4(),
        }
    }

    pub fn new_event(&self, parent_span_id: Option<Uuid>) -> Event {
        new_event(
            self.trace_id,
            self.run_id,
            &self.session_id,
            self.request_id,
            parent_span_id,
        )
    }
}

/// Build a structurally complete event with a fresh span and event id.
pub fn new_event(
    trace_id: Uuid,
    run_id: Uuid,
    session_id: &str,
    request_id: Uuid,
    parent_span_id: Option<Uuid>,
) -> Event {
    Event {
        schema_version: SCHEMA_VERSION.to_string(),
        event_id: Uuid::new_v4(),
        timestamp: Utc::now(),
        trace_id,
        span_id: Uuid::new_v4(),
        parent_span_id,
        observability_mode: ObservabilityMode::BlackBox,
        session: Session {
            session_id: session_id.to_string(),
            run_id,
            agent_id: AGENT_ID.to_string(),
            agent_version: UNKNOWN.to_string(),
            environment: "local".to_string(),
        },
        request: Request {
            request_id,
            user_request_raw: UNKNOWN.to_string(),
            constraints: Vec::new(),
            context: serde_json::Map::new(),
        },
        prompt_provenance: PromptProvenance {
            provider: "anthropic".to_string(),
            model: UNKNOWN.to_string(),
            capture_mode: "full".to_string(),
            prompt_bundle: None,
            prompt_bundle_hash: UNKNOWN.to_string(),
            parameters: SamplingParameters::default(),
        },
        model_output: ModelOutput::default(),
        agent_action: AgentAction::default(),
        evaluation: Evaluation::default(),
    }
}
