//! Credential lookup for the generative service.
//!
//! Lookup order used by the CLI mirrors the usual desktop setup: the OS keychain
//! first, then an environment variable.

use keyring::Entry;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_KEYRING_SERVICE: &str = "prompt-refine";
pub const DEFAULT_KEYRING_ACCOUNT: &str = "api-key";
pub const DEFAULT_ENV_VAR: &str = "REFINE_API_KEY";

/// Read-only source of the service credential.
pub trait SecretStore: Send + Sync {
    fn get(&self) -> Option<String>;
}

/// OS keychain entry.
pub struct KeyringSecretStore {
    service: String,
    account: String,
}

impl KeyringSecretStore {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new(DEFAULT_KEYRING_SERVICE, DEFAULT_KEYRING_ACCOUNT)
    }
}

impl SecretStore for KeyringSecretStore {
    fn get(&self) -> Option<String> {
        let entry = Entry::new(&self.service, &self.account).ok()?;
        match entry.get_password() {
            Ok(key) => non_empty(key),
            Err(e) => {
                debug!(service = %self.service, error = %e, "keyring lookup failed");
                None
            }
        }
    }
}

pub struct EnvSecretStore {
    var: String,
}

impl EnvSecretStore {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvSecretStore {
    fn default() -> Self {
        Self::new(DEFAULT_ENV_VAR)
    }
}

impl SecretStore for EnvSecretStore {
    fn get(&self) -> Option<String> {
        std::env::var(&self.var).ok().and_then(non_empty)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticSecretStore(Option<String>);

impl StaticSecretStore {
    pub fn new(credential: impl Into<String>) -> Self {
        Self(Some(credential.into()))
    }
    pub fn empty() -> Self {
        Self(None)
    }
}

impl SecretStore for StaticSecretStore {
    fn get(&self) -> Option<String> {
        self.0.clone().and_then(non_empty)
    }
}

/// First store with a credential wins.
#[derive(Default)]
pub struct ChainSecretStore {
    stores: Vec<Arc<dyn SecretStore>>,
}

impl ChainSecretStore {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.stores.push(store);
        self
    }
}

impl SecretStore for ChainSecretStore {
    fn get(&self) -> Option<String> {
        self.stores.iter().find_map(|s| s.get())
    }
}

fn non_empty(s: String) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}
