//! Error classification logic
//!
//! Maps arbitrary failure information onto the closed [`ErrorKind`] taxonomy.
//! Matching is case-insensitive over the rendered error message, in a fixed
//! priority order; the first matching rule wins because provider messages often
//! carry overlapping keywords ("rate limit exceeded: maximum 3 requests").

use crate::error_code::ErrorKind;
use crate::Error;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default wait suggested for a rate limit that carries no explicit hint.
pub const DEFAULT_RATE_LIMIT_WAIT_MS: u64 = 60_000;

/// Structured, retry-aware interpretation of a raw failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub kind: ErrorKind,
    pub retryable: bool,
    pub suggested_action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    /// The raw message this classification was derived from.
    pub message: String,
}

impl ErrorClassification {
    /// Builds a classification with the kind's default retryability and action.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            retryable: kind.retryable(),
            suggested_action: kind.suggested_action().to_string(),
            retry_after_ms: None,
            message: message.into(),
        }
    }

    pub fn with_retry_after_ms(mut self, ms: u64) -> Self {
        self.retry_after_ms = Some(ms);
        self
    }

    pub fn with_suggested_action(mut self, action: impl Into<String>) -> Self {
        self.suggested_action = action.into();
        self
    }
}

impl fmt::Display for ErrorClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}] {}", self.kind.code(), self.kind.name(), self.message)
    }
}

impl std::error::Error for ErrorClassification {}

const AUTH_SIGNALS: &[&str] = &[
    "unauthorized",
    "unauthenticated",
    "invalid api key",
    "invalid_api_key",
    "incorrect api key",
    "invalid credential",
    "missing credential",
    "no credential",
    "authentication",
    "permission denied",
    "permission_denied",
    "forbidden",
    "http 401",
    "http 403",
];

const RATE_LIMIT_SIGNALS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "quota",
    "http 429",
];

const NETWORK_SIGNALS: &[&str] = &[
    "network",
    "timeout",
    "timed out",
    "econnrefused",
    "connection refused",
    "econnreset",
    "connection reset",
    "connection closed",
    "enotfound",
    "dns",
    "getaddrinfo",
    "socket hang up",
    "fetch failed",
    "error sending request",
];

const TOKEN_OVERFLOW_SIGNALS: &[&str] = &[
    "token",
    "context length",
    "context_length",
    "context window",
    "too long",
    "maximum",
];

const API_ERROR_SIGNALS: &[&str] = &[
    "http 5",
    "internal server error",
    "server error",
    "service unavailable",
    "bad gateway",
    "overloaded",
    "unavailable",
];

static WAIT_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:wait|retry after|retry in|try again in)\s+(\d+(?:\.\d+)?)\s*(milliseconds?|ms|minutes?|mins?|m|seconds?|secs?|s)\b",
    )
    .expect("static regex")
});

/// Stateless classifier; cheap to construct and copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a crate error. Already-classified errors pass through unchanged.
    pub fn classify(&self, err: &Error) -> ErrorClassification {
        if let Some(c) = err.classification() {
            return c.clone();
        }
        self.classify_message(&err.to_string())
    }

    /// Classify a raw failure message.
    pub fn classify_message(&self, message: &str) -> ErrorClassification {
        let m = message.to_lowercase();
        let has = |signals: &[&str]| signals.iter().any(|s| m.contains(s));

        if has(AUTH_SIGNALS) {
            return ErrorClassification::new(ErrorKind::Auth, message);
        }
        if has(RATE_LIMIT_SIGNALS) {
            let wait = parse_wait_hint_ms(message).unwrap_or(DEFAULT_RATE_LIMIT_WAIT_MS);
            return ErrorClassification::new(ErrorKind::RateLimit, message)
                .with_retry_after_ms(wait)
                .with_suggested_action(format!(
                    "Rate limit reached. Wait about {} seconds before trying again.",
                    wait.div_ceil(1000)
                ));
        }
        if has(NETWORK_SIGNALS) {
            return ErrorClassification::new(ErrorKind::Network, message);
        }
        if has(TOKEN_OVERFLOW_SIGNALS) {
            return ErrorClassification::new(ErrorKind::TokenOverflow, message);
        }
        if has(API_ERROR_SIGNALS) {
            return ErrorClassification::new(ErrorKind::ApiError, message);
        }
        ErrorClassification::new(ErrorKind::Unknown, message)
    }
}

/// Extracts a "wait N seconds/minutes" style hint, converted to milliseconds.
pub fn parse_wait_hint_ms(message: &str) -> Option<u64> {
    let caps = WAIT_HINT.captures(message)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_lowercase();
    let factor = if unit == "ms" || unit.starts_with("milli") {
        1.0
    } else if unit == "m" || unit.starts_with("min") {
        60_000.0
    } else {
        1_000.0
    };
    Some((value * factor).round() as u64)
}
