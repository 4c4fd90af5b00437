//! Structured log hooks for the observed-run lifecycle.
//!
//! These are operator diagnostics, separate from the `events.jsonl` trace.
//! Every line carries a fixed `event` field for filtering.

use tracing::{info, warn};

use crate::agent::AgentOutcome;
use crate::domain::Phase;

/// Span tagging every log line of one run with its run id.
///
/// Attach it to the run future with `tracing::Instrument` rather than
/// entering it, since the run awaits the agent process.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("observer.run", run_id = %run_id)
}

pub fn emit_run_started(run_id: &str, scenario_id: &str, run_dir: &str) {
    info!(event = "run.started", run_id = %run_id, scenario_id = %scenario_id, run_dir = %run_dir);
}

/// A trace event was appended at position `seq`.
pub fn emit_phase_recorded(phase: Phase, span_id: &str, seq: usize) {
    tracing::debug!(event = "run.phase_recorded", phase = %phase, span_id = %span_id, seq = seq);
}

pub fn emit_agent_completed(outcome: &AgentOutcome) {
    info!(
        event = "agent.completed",
        exit_code = outcome.exit_code,
        duration_ms = outcome.duration_ms,
        termination = outcome.termination.as_str(),
    );
}

/// A version-control call failed; the run continues with degraded data.
pub fn emit_vcs_degraded(operation: &str, error: &dyn std::fmt::Display) {
    warn!(event = "vcs.degraded", operation = %operation, error = %error);
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, total_events: usize, exit_code: i32) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        total_events = total_events,
        exit_code = exit_code,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let span = run_span("test-run-id");
        let _entered = span.enter();
    }
}
