//! Refinement error taxonomy: a closed set of failure kinds with retry semantics.
//!
//! Every failure the pipeline surfaces carries one of these kinds, so callers can
//! branch on it (for example, offering a "re-enter credential" affordance for
//! [`ErrorKind::Auth`]).
//!
//! ## Error Code Categories
//!
//! | Code  | Kind             | Retryable | Caller intervention          |
//! |-------|------------------|-----------|------------------------------|
//! | R1001 | `auth`           | no        | re-enter the credential      |
//! | R1002 | `token_overflow` | no        | shorten the input            |
//! | R1003 | `invalid_input`  | no        | fix the request              |
//! | R2001 | `rate_limit`     | yes       | wait                         |
//! | R3001 | `network`        | yes       | check connectivity           |
//! | R3002 | `api_error`      | yes       | try again later              |
//! | R9999 | `unknown`        | no        | report                       |
//!
//! ## Example
//!
//! ```rust
//! use prompt_refine::error_code::ErrorKind;
//!
//! let kind = ErrorKind::from_name("rate_limit").unwrap();
//! assert_eq!(kind.code(), "R2001");
//! assert!(kind.retryable());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed taxonomy of refinement failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Missing, invalid or unauthorized credential
    Auth,
    /// Request rate or usage quota exceeded
    RateLimit,
    /// Connectivity, DNS or timeout failure
    Network,
    /// Input exceeds the model's context window or the local token budget
    TokenOverflow,
    /// Request rejected locally before any call (e.g. empty input)
    InvalidInput,
    /// Service-side failure (5xx, unavailable, overloaded)
    ApiError,
    /// Failure could not be classified
    Unknown,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        Self::Auth,
        Self::RateLimit,
        Self::Network,
        Self::TokenOverflow,
        Self::InvalidInput,
        Self::ApiError,
        Self::Unknown,
    ];

    /// Returns the stable code string (e.g., `"R1001"`).
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth => "R1001",
            Self::TokenOverflow => "R1002",
            Self::InvalidInput => "R1003",
            Self::RateLimit => "R2001",
            Self::Network => "R3001",
            Self::ApiError => "R3002",
            Self::Unknown => "R9999",
        }
    }

    /// Returns the standard name (e.g., `"rate_limit"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::Network => "network",
            Self::TokenOverflow => "token_overflow",
            Self::InvalidInput => "invalid_input",
            Self::ApiError => "api_error",
            Self::Unknown => "unknown",
        }
    }

    /// Returns whether a failure of this kind is worth retrying as-is.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Network | Self::ApiError)
    }

    /// Human-readable next step for the caller.
    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::Auth => "Re-enter your API key; the stored credential was rejected or is missing.",
            Self::RateLimit => "Rate limit reached. Wait a moment before trying again.",
            Self::Network => "Check your network connection and try again.",
            Self::TokenOverflow => "Shorten the request or reduce the included context.",
            Self::InvalidInput => "Enter a non-empty request describing what you want to build.",
            Self::ApiError => "The service is having trouble. Try again shortly.",
            Self::Unknown => "An unexpected error occurred. Try again or check the logs.",
        }
    }

    /// Parses a standard name back into a kind.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        let mut codes: Vec<_> = ErrorKind::ALL.iter().map(|k| k.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), ErrorKind::ALL.len());
    }

    #[test]
    fn test_only_transient_kinds_are_retryable() {
        let retryable: Vec<_> = ErrorKind::ALL.into_iter().filter(|k| k.retryable()).collect();
        assert_eq!(
            retryable,
            vec![ErrorKind::RateLimit, ErrorKind::Network, ErrorKind::ApiError]
        );
    }

    #[test]
    fn test_name_round_trip_and_serde_form() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(
            serde_json::to_string(&ErrorKind::TokenOverflow).unwrap(),
            "\"TOKEN_OVERFLOW\""
        );
        assert_eq!(ErrorKind::from_name("bogus"), None);
    }
}
