//! Token counter implementations.

pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Word/punctuation heuristic: ~1.3 tokens per whitespace-delimited word plus
/// 0.5 per punctuation character, rounded up.
#[derive(Debug, Clone)]
pub struct WordHeuristicEstimator {
    tokens_per_word: f64,
    tokens_per_punctuation: f64,
}

impl WordHeuristicEstimator {
    pub fn new() -> Self {
        Self::with_ratios(1.3, 0.5)
    }
    pub fn with_ratios(per_word: f64, per_punctuation: f64) -> Self {
        Self {
            tokens_per_word: per_word,
            tokens_per_punctuation: per_punctuation,
        }
    }
}

impl Default for WordHeuristicEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter for WordHeuristicEstimator {
    fn count(&self, text: &str) -> usize {
        let words = text.split_whitespace().count();
        let punct = text.chars().filter(|c| c.is_ascii_punctuation()).count();
        (words as f64 * self.tokens_per_word + punct as f64 * self.tokens_per_punctuation).ceil()
            as usize
    }
}
