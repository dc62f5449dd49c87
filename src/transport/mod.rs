//! Generative text service: the trait the pipeline consumes and its HTTP implementation.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`GenerativeService`] | Request/response and streaming calls |
//! | [`HttpGenerativeService`] | OpenAI-compatible chat completions over HTTP + SSE |
//! | [`ClientFactory`] | Lazily built HTTP client, rebuilt on credential change |
//! | [`sse`] | Server-sent-events frame decoder |

pub mod http;
pub mod sse;

pub use http::{ClientFactory, HttpGenerativeService, HttpTransport};

use crate::{BoxStream, Result};
use async_trait::async_trait;

/// External text-generation service. Failures are reported as crate errors and
/// are never interpreted here beyond classification.
#[async_trait]
pub trait GenerativeService: Send + Sync {
    /// Single request/response call returning the full text.
    async fn send(&self, prompt: &str, credential: &str) -> Result<String>;

    /// Streaming call. The returned sequence yields whole text fragments in
    /// service order and ends when the service closes the stream.
    async fn stream(&self, prompt: &str, credential: &str) -> Result<BoxStream<'static, String>>;

    fn name(&self) -> &'static str {
        "generative"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}
