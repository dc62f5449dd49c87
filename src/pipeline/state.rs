use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-request state machine.
///
/// ```text
/// Received -> ContextGathered -> TokenChecked -> CacheHit
///                                             -> CacheMiss -> Streaming -> Completed | Cancelled | Failed
/// ```
///
/// Failures before streaming (empty input, token overflow, missing credential)
/// jump straight to `Failed`; cancellation is honoured before context gathering
/// and before the service call as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefineState {
    Received,
    ContextGathered,
    TokenChecked,
    CacheHit,
    CacheMiss,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl RefineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RefineState::CacheHit | RefineState::Completed | RefineState::Cancelled | RefineState::Failed
        )
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: RefineState) -> bool {
        use RefineState::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Failed) | (_, Cancelled) => true,
            (Received, ContextGathered) => true,
            (ContextGathered, TokenChecked) => true,
            (TokenChecked, CacheHit) | (TokenChecked, CacheMiss) => true,
            (CacheMiss, Streaming) => true,
            (Streaming, Completed) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RefineState::Received => "RECEIVED",
            RefineState::ContextGathered => "CONTEXT_GATHERED",
            RefineState::TokenChecked => "TOKEN_CHECKED",
            RefineState::CacheHit => "CACHE_HIT",
            RefineState::CacheMiss => "CACHE_MISS",
            RefineState::Streaming => "STREAMING",
            RefineState::Completed => "COMPLETED",
            RefineState::Cancelled => "CANCELLED",
            RefineState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RefineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::RefineState::*;

    #[test]
    fn test_happy_paths() {
        let miss = [Received, ContextGathered, TokenChecked, CacheMiss, Streaming, Completed];
        assert!(miss.windows(2).all(|w| w[0].can_transition_to(w[1])));
        assert!(TokenChecked.can_transition_to(CacheHit));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for s in [CacheHit, Completed, Cancelled, Failed] {
            assert!(s.is_terminal());
            assert!(!s.can_transition_to(Streaming));
            assert!(!s.can_transition_to(Failed));
        }
        assert!(!Received.can_transition_to(Streaming));
        assert!(Streaming.can_transition_to(Cancelled));
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(serde_json::to_string(&CacheMiss).unwrap(), "\"CACHE_MISS\"");
        assert_eq!(ContextGathered.to_string(), "CONTEXT_GATHERED");
    }
}
