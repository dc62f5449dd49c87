use crate::resilience::ErrorClassification;
use crate::transport::TransportError;
use std::fmt;
use thiserror::Error;

/// Where an error came from: offending field, expected/actual detail, and the
/// component that raised it. Rendered as a ` (field: .., details: .., source: ..)`
/// suffix; renders as nothing when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// e.g. `config.cache_max_size` or `REFINE_TIMEOUT_MS`
    pub field_path: Option<String>,
    pub details: Option<String>,
    /// e.g. `config`, `env`
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.field_path.is_none() && self.details.is_none() && self.source.is_none()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        let parts: Vec<String> = [
            ("field", &self.field_path),
            ("details", &self.details),
            ("source", &self.source),
        ]
        .iter()
        .filter_map(|(label, value)| value.as_ref().map(|v| format!("{}: {}", label, v)))
        .collect();
        write!(f, " ({})", parts.join(", "))
    }
}

/// Crate error.
///
/// Collaborators (service, secret store, context provider) fail with this type.
/// The pipeline never surfaces it directly: every failure is turned into an
/// [`ErrorClassification`] first.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{context}")]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{context}")]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{context}")]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    /// Non-success HTTP status from the generative service.
    #[error("Remote error: HTTP {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Already mapped onto the failure taxonomy; classification passes it through.
    #[error("{0}")]
    Classified(ErrorClassification),
}

impl Error {
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Plain runtime error, the usual shape for collaborator failures.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::runtime_with_context(msg, ErrorContext::new())
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    pub fn classification(&self) -> Option<&ErrorClassification> {
        match self {
            Error::Classified(c) => Some(c),
            _ => None,
        }
    }
}

impl From<ErrorClassification> for Error {
    fn from(c: ErrorClassification) -> Self {
        Error::Classified(c)
    }
}
