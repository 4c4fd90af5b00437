//! Domain models for the observer.
//!
//! - `Event`: one immutable trace record with a fixed, default-filled schema
//! - `Evaluation`: fixed-shape evaluation block
//! - `ObserverError`: runner-fatal error taxonomy

pub mod error;
pub mod evaluation;
pub mod event;

pub use error::{CausalityError, ObserverError, Result};
pub use evaluation::{Alignment, Check, CheckGroup, EvalStatus, Evaluation};
pub use event::{
    default_constraints, new_event, ActionType, AgentAction, ArtifactKind, ArtifactRef,
    Constraint, Event, ModelOutput, ObservabilityMode, Phase, PromptProvenance, Request,
    SamplingParameters, Session, TraceContext, Usage, AGENT_ID, SCHEMA_VERSION, UNKNOWN,
};
