//! # prompt-refine
//!
//! Refinement request pipeline: turns a short natural-language request into a
//! clearer, more actionable prompt by enriching it with project context and
//! streaming it through a generative text service.
//!
//! ## Overview
//!
//! The pipeline de-duplicates and caches identical requests, classifies and
//! retries transient service failures, streams partial output with cancellation
//! and progress, and validates the assembled prompt against a token budget
//! before any network call.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use prompt_refine::{
//!     noop_observer, HttpGenerativeService, RefineConfig, RefineOutcome, RefinementPipeline,
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> prompt_refine::Result<()> {
//!     let config = RefineConfig::default().with_env_overrides()?;
//!     let service = Arc::new(HttpGenerativeService::new(&config.base_url, &config.model_id));
//!     let pipeline = RefinementPipeline::builder(service).config(config).build()?;
//!
//!     match pipeline.refine("add dark mode", noop_observer(), &CancellationToken::new()).await {
//!         Ok(RefineOutcome::Completed(r)) => println!("{}", r.text),
//!         Ok(RefineOutcome::Cancelled) => {}
//!         Err(c) => eprintln!("{}: {}", c, c.suggested_action),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`pipeline`] | Request state machine and coordination |
//! | [`streaming`] | Service calls, in-flight de-duplication, progress |
//! | [`cache`] | Fingerprinting and the bounded LRU/TTL result cache |
//! | [`resilience`] | Error classification and retry with backoff |
//! | [`error_code`] | Closed failure taxonomy |
//! | [`tokens`] | Token estimation and budget validation |
//! | [`context`] | Project and active-file context providers |
//! | [`prompt`] | Outbound prompt construction |
//! | [`transport`] | Generative service trait and HTTP implementation |
//! | [`secrets`] | Credential stores |
//! | [`telemetry`] | History and telemetry sinks |
//! | [`config`] | Configuration loading and validation |

pub mod cache;
pub mod config;
pub mod context;
pub mod error_code;
pub mod pipeline;
pub mod prompt;
pub mod resilience;
pub mod secrets;
pub mod streaming;
pub mod telemetry;
pub mod tokens;
pub mod transport;

// Re-export main types for convenience
pub use cache::{Fingerprint, RequestCache};
pub use config::RefineConfig;
pub use context::{ContextProvider, WorkspaceContextProvider};
pub use error_code::ErrorKind;
pub use pipeline::{
    noop_observer, RefineObserver, RefineOutcome, RefineState, Refinement, RefinementPipeline,
    RefinementPipelineBuilder,
};
pub use resilience::{ErrorClassification, ErrorClassifier, RetryExecutor, RetryPolicy};
pub use secrets::SecretStore;
pub use streaming::StreamingOrchestrator;
pub use telemetry::HistorySink;
pub use transport::{GenerativeService, HttpGenerativeService};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
