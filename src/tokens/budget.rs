//! Token budget validation for assembled prompts.

use super::counter::{TokenCounter, WordHeuristicEstimator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenValidationResult {
    pub is_valid: bool,
    pub estimated_tokens: usize,
    pub max_tokens: usize,
    pub usage_percent: f64,
    pub warning: Option<String>,
    pub error: Option<String>,
}

/// Fixed ceiling plus a warning threshold (fraction of the ceiling).
#[derive(Clone)]
pub struct TokenBudget {
    max_tokens: usize,
    warning_threshold: f64,
    counter: Arc<dyn TokenCounter>,
}

impl TokenBudget {
    pub fn new(max_tokens: usize, warning_threshold: f64) -> Self {
        Self {
            max_tokens: max_tokens.max(1),
            warning_threshold,
            counter: Arc::new(WordHeuristicEstimator::new()),
        }
    }

    pub fn with_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn validate(&self, text: &str) -> TokenValidationResult {
        let estimated = self.counter.count(text);
        let usage_percent = estimated as f64 / self.max_tokens as f64 * 100.0;
        let mut result = TokenValidationResult {
            is_valid: true,
            estimated_tokens: estimated,
            max_tokens: self.max_tokens,
            usage_percent,
            warning: None,
            error: None,
        };
        if usage_percent >= 100.0 {
            result.is_valid = false;
            result.error = Some(format!(
                "Prompt is too long: about {} tokens against a maximum of {}",
                estimated, self.max_tokens
            ));
        } else if usage_percent >= self.warning_threshold * 100.0 {
            result.warning = Some(format!(
                "Prompt uses {:.0}% of the {}-token budget",
                usage_percent, self.max_tokens
            ));
        }
        result
    }
}

impl std::fmt::Debug for TokenBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBudget")
            .field("max_tokens", &self.max_tokens)
            .field("warning_threshold", &self.warning_threshold)
            .finish()
    }
}
