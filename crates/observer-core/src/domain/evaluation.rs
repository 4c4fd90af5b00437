//! Evaluation block carried by every event.

use serde::{Deserialize, Serialize};

/// Outcome of an evaluation or one of its checks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvalStatus {
    Pass,
    Fail,
    #[default]
    Unknown,
}

impl EvalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvalStatus::Pass => "pass",
            EvalStatus::Fail => "fail",
            EvalStatus::Unknown => "unknown",
        }
    }
}

/// A single named check and where its evidence lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Check {
    pub id: String,
    pub status: EvalStatus,
    pub evidence: String,
}

impl Check {
    /// A check that was not executed; `evidence` names the artifact that would
    /// decide it.
    pub fn indeterminate(id: impl Into<String>, evidence: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: EvalStatus::Unknown,
            evidence: evidence.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Alignment {
    pub status: EvalStatus,
    pub score: Option<f64>,
    pub violations: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CheckGroup {
    pub status: EvalStatus,
    pub checks: Vec<Check>,
}

impl CheckGroup {
    pub fn unknown(checks: Vec<Check>) -> Self {
        Self {
            status: EvalStatus::Unknown,
            checks,
        }
    }
}

/// Fixed-shape evaluation: alignment, quality, policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Evaluation {
    pub alignment: Alignment,
    pub quality: CheckGroup,
    pub policy: CheckGroup,
}

impl Evaluation {
    /// One-line status summary, e.g. `alignment=unknown quality=unknown policy=unknown`.
    pub fn status_line(&self) -> String {
        format!(
            "alignment={} quality={} policy={}",
            self.alignment.status.as_str(),
            self.quality.status.as_str(),
            self.policy.status.as_str()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_evaluation_is_unknown_everywhere() {
        let eval = Evaluation::default();
        assert_eq!(eval.alignment.status, EvalStatus::Unknown);
        assert!(eval.alignment.score.is_none());
        assert!(eval.quality.checks.is_empty());
        assert_eq!(
            eval.status_line(),
            "alignment=unknown quality=unknown policy=unknown"
        );
    }

    #[test]
    fn serializes_with_fixed_shape() {
        let json = serde_json::to_value(Evaluation::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "alignment": {"status": "unknown", "score": null, "violations": []},
                "quality": {"status": "unknown", "checks": []},
                "policy": {"status": "unknown", "checks": []},
            })
        );
    }

    #[test]
    fn indeterminate_check() {
        let check = Check::indeterminate("style.no_emojis", "stdout artifact ref");
        assert_eq!(check.status, EvalStatus::Unknown);
        assert_eq!(check.id, "style.no_emojis");
    }
}
