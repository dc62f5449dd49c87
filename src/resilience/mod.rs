//! Failure classification and retry.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ErrorClassifier`] | Maps raw failures onto [`ErrorKind`](crate::error_code::ErrorKind) with retry metadata |
//! | [`RetryExecutor`] | Exponential-backoff driver parameterized by the classifier |
//! | [`RetryPolicy`] | Attempt count and delay bounds |
//!
//! ## Example
//!
//! ```rust
//! use prompt_refine::resilience::{RetryExecutor, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn demo() {
//! let exec = RetryExecutor::new(
//!     RetryPolicy::new()
//!         .with_max_attempts(3)
//!         .with_initial_delay(Duration::from_millis(500)),
//! );
//! let out = exec.execute(|| async { Ok::<_, prompt_refine::Error>(42) }).await;
//! assert_eq!(out.unwrap(), 42);
//! # }
//! ```

pub mod classifier;
pub mod retry;

pub use classifier::{ErrorClassification, ErrorClassifier, DEFAULT_RATE_LIMIT_WAIT_MS};
pub use retry::{RetryExecutor, RetryPolicy};
