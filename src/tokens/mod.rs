//! Token estimation and budget checks.
//!
//! Token budgets are enforced locally, before any network call: a prompt that
//! would overflow the ceiling is the cheapest failure there is.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`TokenCounter`] | Trait for token counting implementations |
//! | [`WordHeuristicEstimator`] | ~1.3 tokens/word + 0.5 per punctuation character |
//! | [`TokenBudget`] | Ceiling + warning threshold validation |
//! | [`TokenValidationResult`] | Outcome of a budget check |
//!
//! ```rust
//! use prompt_refine::tokens::TokenBudget;
//!
//! let budget = TokenBudget::new(8000, 0.8);
//! let r = budget.validate("add dark mode");
//! assert!(r.is_valid);
//! ```

mod budget;
mod counter;

pub use budget::{TokenBudget, TokenValidationResult};
pub use counter::{TokenCounter, WordHeuristicEstimator};
