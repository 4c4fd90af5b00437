//! Agent Observer Core Library
//!
//! Black-box observation of a single coding-agent invocation: prepare an
//! isolated workspace, run the agent, capture its output and filesystem
//! delta, and persist a causally ordered event trace.

pub mod agent;
pub mod assembler;
pub mod config;
pub mod domain;
pub mod git;
pub mod hashing;
pub mod obs;
pub mod output;
pub mod snapshot;
pub mod telemetry;
pub mod trace;
pub mod workspace;

pub use agent::{
    execute_agent, AgentInvocation, AgentOutcome, Termination, COMMAND_NOT_FOUND_EXIT_CODE,
    DEFAULT_AGENT_TIMEOUT, OUTPUT_LOST_EXIT_CODE, TIMEOUT_EXIT_CODE,
};
pub use assembler::{RunAssembler, RunReport, MAX_REPORTED_PATHS};
pub use config::RunnerConfig;
pub use domain::{
    new_event, ActionType, ArtifactKind, ArtifactRef, CausalityError, EvalStatus, Evaluation,
    Event, ObserverError, Phase, Result, TraceContext,
};
pub use git::{GitCli, GitIdentity, VersionControl};
pub use hashing::{hash_bytes, hash_file, ContentId};
pub use output::{read_events, verify_artifacts, write_events, RunLayout};
pub use snapshot::{changed_paths, snapshot, Snapshot};
pub use telemetry::{init_tracing, LogFormat};
pub use trace::{validate_trace, TraceLog};
pub use workspace::{prepare_workspace, WorkspaceOrigin};

/// Observer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
