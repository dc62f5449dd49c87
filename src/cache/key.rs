//! Fingerprint generation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Number of hex characters kept from the SHA-256 digest.
pub const FINGERPRINT_LEN: usize = 16;

/// Opaque, fixed-length key identifying a cacheable refinement request.
///
/// Used both as the cache key and as the in-flight de-duplication key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct FingerprintGenerator {
    salt: Option<String>,
}

impl FingerprintGenerator {
    pub fn new() -> Self {
        Self { salt: None }
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// Derive the fingerprint for `(user_input, model_id, context_digest)`.
    ///
    /// The triple is serialized as canonical JSON before hashing so field
    /// boundaries stay unambiguous ("ab" + "c" never collides with "a" + "bc").
    pub fn generate(&self, user_input: &str, model_id: &str, context_digest: &str) -> Fingerprint {
        let mut parts: BTreeMap<&str, &str> = BTreeMap::new();
        parts.insert("input", user_input);
        parts.insert("model", model_id);
        parts.insert("context", context_digest);
        if let Some(ref s) = self.salt {
            parts.insert("salt", s);
        }
        let canonical = serde_json::to_string(&parts).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hex: String = hasher
            .finalize()
            .iter()
            .take(FINGERPRINT_LEN / 2)
            .map(|b| format!("{:02x}", b))
            .collect();
        Fingerprint(hex)
    }
}

impl Default for FingerprintGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Fingerprint with the default (unsalted) generator.
pub fn fingerprint(user_input: &str, model_id: &str, context_digest: &str) -> Fingerprint {
    FingerprintGenerator::new().generate(user_input, model_id, context_digest)
}
