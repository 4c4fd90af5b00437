//! Append-only trace log with span causality checks.
//!
//! A trace has exactly one root event (null parent) and it is emitted first.
//! Every later event names a parent span emitted earlier in the same trace.

use std::collections::HashSet;

use uuid::Uuid;

use crate::domain::{CausalityError, Event, Phase};

/// Events of one run in emission order.
#[derive(Debug, Clone)]
pub struct TraceLog {
    trace_id: Uuid,
    root: Option<Uuid>,
    events: Vec<Event>,
    spans: HashSet<Uuid>,
}

impl TraceLog {
    pub fn new(trace_id: Uuid) -> Self {
        Self {
            trace_id,
            root: None,
            events: Vec::new(),
            spans: HashSet::new(),
        }
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    /// Tag `event` with its phase and append it. Returns the event's span id.
    ///
    /// The summary becomes `[<phase>] <summary>`; nothing else is touched.
    pub fn append(&mut self, mut event: Event, phase: Phase) -> Result<Uuid, CausalityError> {
        self.check(&event)?;
        event.agent_action.action_summary =
            format!("[{phase}] {}", event.agent_action.action_summary);
        let span_id = event.span_id;
        self.record(&event);
        self.events.push(event);
        Ok(span_id)
    }

    fn record(&mut self, event: &Event) {
        if event.parent_span_id.is_none() {
            self.root = Some(event.span_id);
        }
        self.spans.insert(event.span_id);
    }

    fn check(&self, event: &Event) -> Result<(), CausalityError> {
        if event.trace_id != self.trace_id {
            return Err(CausalityError::ForeignTrace {
                span: event.span_id,
                expected: self.trace_id,
                actual: event.trace_id,
            });
        }
        if self.spans.contains(&event.span_id) {
            return Err(CausalityError::DuplicateSpan {
                span: event.span_id,
            });
        }
        match (event.parent_span_id, self.root_span()) {
            (None, None) => Ok(()),
            (None, Some(existing)) => Err(CausalityError::DuplicateRoot { existing }),
            (Some(parent), None) => Err(CausalityError::MissingRoot { parent }),
            (Some(parent), Some(_)) if self.spans.contains(&parent) => Ok(()),
            (Some(parent), Some(_)) => Err(CausalityError::UnknownParent {
                span: event.span_id,
                parent,
            }),
        }
    }

    pub fn root_span(&self) -> Option<Uuid> {
        self.root
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

/// Check a finished event sequence against the causality rules.
///
/// An empty sequence is valid. The first event fixes the trace id.
pub fn validate_trace(events: &[Event]) -> Result<(), CausalityError> {
    let Some(first) = events.first() else {
        return Ok(());
    };
    let mut log = TraceLog::new(first.trace_id);
    for event in events {
        log.check(event)?;
        log.record(event);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TraceContext;

    #[test]
    fn append_prefixes_summary_and_returns_span() {
        let ctx = TraceContext::new("default");
        let mut log = TraceLog::new(ctx.trace_id);
        let mut root = ctx.new_event(None);
        root.agent_action.action_summary = "run_id=x".to_string();
        let expected = root.span_id;

        let span = log.append(root, Phase::RunStarted).unwrap();
        assert_eq!(span, expected);
        assert_eq!(log.root_span(), Some(expected));
        assert_eq!(
            log.events()[0].agent_action.action_summary,
            "[run_started] run_id=x"
        );
        assert_eq!(log.events()[0].phase(), Some(Phase::RunStarted));
    }

    #[test]
    fn second_root_is_rejected() {
        let ctx = TraceContext::new("default");
        let mut log = TraceLog::new(ctx.trace_id);
        log.append(ctx.new_event(None), Phase::RunStarted).unwrap();
        let err = log.append(ctx.new_event(None), Phase::RunFinished);
        assert!(matches!(err, Err(CausalityError::DuplicateRoot { .. })));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn child_before_root_is_rejected() {
        let ctx = TraceContext::new("default");
        let mut log = TraceLog::new(ctx.trace_id);
        let err = log.append(ctx.new_event(Some(Uuid::new_v4())), Phase::AgentInvoked);
        assert!(matches!(err, Err(CausalityError::MissingRoot { .. })));
        assert!(log.is_empty());
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let ctx = TraceContext::new("default");
        let mut log = TraceLog::new(ctx.trace_id);
        log.append(ctx.new_event(None), Phase::RunStarted).unwrap();
        let err = log.append(ctx.new_event(Some(Uuid::new_v4())), Phase::AgentInvoked);
        assert!(matches!(err, Err(CausalityError::UnknownParent { .. })));
    }

    #[test]
    fn foreign_trace_is_rejected() {
        let ctx = TraceContext::new("default");
        let other = TraceContext::new("default");
        let mut log = TraceLog::new(ctx.trace_id);
        let err = log.append(other.new_event(None), Phase::RunStarted);
        assert!(matches!(err, Err(CausalityError::ForeignTrace { .. })));
    }

    #[test]
    fn validate_accepts_nested_chain() {
        let ctx = TraceContext::new("default");
        let mut log = TraceLog::new(ctx.trace_id);
        let root = log.append(ctx.new_event(None), Phase::RunStarted).unwrap();
        let invoked = log
            .append(ctx.new_event(Some(root)), Phase::AgentInvoked)
            .unwrap();
        log.append(ctx.new_event(Some(invoked)), Phase::AgentCompleted)
            .unwrap();
        log.append(ctx.new_event(Some(root)), Phase::RunFinished)
            .unwrap();
        assert!(validate_trace(log.events()).is_ok());
    }

    #[test]
    fn validate_rejects_out_of_order_parent() {
        let ctx = TraceContext::new("default");
        let root = ctx.new_event(None);
        let late_parent = ctx.new_event(Some(root.span_id));
        let child = ctx.new_event(Some(late_parent.span_id));
        let events = vec![root, child, late_parent];
        assert!(matches!(
            validate_trace(&events),
            Err(CausalityError::UnknownParent { .. })
        ));
    }

    #[test]
    fn validate_empty_is_ok() {
        assert!(validate_trace(&[]).is_ok());
    }
}
