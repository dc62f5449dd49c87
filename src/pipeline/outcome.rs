use crate::cache::Fingerprint;
use serde::Serialize;
use std::time::Duration;

/// A finished refinement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Refinement {
    pub text: String,
    pub fingerprint: Fingerprint,
    pub from_cache: bool,
    /// Joined another caller's in-flight request instead of calling the service.
    pub deduplicated: bool,
    /// Token budget warning, if the prompt crossed the warning threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub estimated_tokens: usize,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

/// Terminal result of a call that did not fail. Cancellation carries no message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefineOutcome {
    Completed(Refinement),
    Cancelled,
}

impl RefineOutcome {
    pub fn refinement(&self) -> Option<&Refinement> {
        match self {
            RefineOutcome::Completed(r) => Some(r),
            RefineOutcome::Cancelled => None,
        }
    }

    pub fn into_refinement(self) -> Option<Refinement> {
        match self {
            RefineOutcome::Completed(r) => Some(r),
            RefineOutcome::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RefineOutcome::Cancelled)
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
