//! Request cache: avoids repeated calls to the generative service for identical
//! refinement requests within a session.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RequestCache`] | Bounded, TTL-expiring, LRU-evicting store with hit/miss statistics |
//! | [`CacheConfig`] | Capacity, TTL and on/off switch |
//! | [`Fingerprint`] | Truncated SHA-256 key over `(input, model, context)` |
//! | [`FingerprintGenerator`] | Canonical-JSON fingerprint derivation |
//!
//! ## Example
//!
//! ```rust
//! use prompt_refine::cache::{fingerprint, CacheConfig, RequestCache};
//! use std::time::Duration;
//!
//! let cache = RequestCache::new(
//!     CacheConfig::new()
//!         .with_max_size(50)
//!         .with_ttl(Duration::from_secs(3600)),
//! );
//! let key = fingerprint("add dark mode", "gpt-4o-mini", r#"{"framework":"react"}"#);
//! cache.set(key.clone(), "Implement a dark mode toggle.", "gpt-4o-mini", 13);
//! assert_eq!(cache.get(&key).as_deref(), Some("Implement a dark mode toggle."));
//! ```
//!
//! Entries are never persisted; a restart starts from an empty cache.

mod key;
mod manager;

pub use key::{fingerprint, Fingerprint, FingerprintGenerator, FINGERPRINT_LEN};
pub use manager::{CacheConfig, CacheEntry, CacheStats, RequestCache};
