//! In-flight request registry keyed by fingerprint.
//!
//! The first caller for a fingerprint becomes the leader and holds an
//! [`InflightGuard`]; later callers get an [`InflightWaiter`] for the leader's
//! outcome. The map entry is removed when the guard drops, whatever the exit
//! path (success, failure, cancellation, panic unwind).

use crate::cache::Fingerprint;
use crate::resilience::ErrorClassification;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::debug;

/// How a leader's request settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InflightOutcome {
    Completed(String),
    Failed(ErrorClassification),
    /// Cancelled or dropped without an outcome.
    Abandoned,
}

type Slot = watch::Receiver<Option<InflightOutcome>>;

#[derive(Clone, Default)]
pub struct InflightRegistry {
    entries: Arc<Mutex<HashMap<Fingerprint, Slot>>>,
}

pub enum Admission {
    Leader(InflightGuard),
    Follower(InflightWaiter),
}

impl InflightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `fingerprint`, or joins the request already registered for it.
    pub fn admit(&self, fingerprint: &Fingerprint) -> Admission {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(slot) = entries.get(fingerprint) {
            debug!(fingerprint = %fingerprint, "joining in-flight request");
            return Admission::Follower(InflightWaiter { rx: slot.clone() });
        }
        let (tx, rx) = watch::channel(None);
        entries.insert(fingerprint.clone(), rx.clone());
        Admission::Leader(InflightGuard {
            entries: self.entries.clone(),
            fingerprint: fingerprint.clone(),
            tx,
            own: rx,
            settled: false,
        })
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Leader side of an in-flight entry.
pub struct InflightGuard {
    entries: Arc<Mutex<HashMap<Fingerprint, Slot>>>,
    fingerprint: Fingerprint,
    tx: watch::Sender<Option<InflightOutcome>>,
    own: Slot,
    settled: bool,
}

impl InflightGuard {
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn complete(self, text: impl Into<String>) {
        self.settle(InflightOutcome::Completed(text.into()));
    }

    pub fn fail(self, classification: ErrorClassification) {
        self.settle(InflightOutcome::Failed(classification));
    }

    fn settle(mut self, outcome: InflightOutcome) {
        self.tx.send_replace(Some(outcome));
        self.settled = true;
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        {
            let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
            if entries
                .get(&self.fingerprint)
                .is_some_and(|slot| slot.same_channel(&self.own))
            {
                entries.remove(&self.fingerprint);
            }
        }
        if !self.settled {
            self.tx.send_replace(Some(InflightOutcome::Abandoned));
        }
    }
}

/// Follower side: resolves once the leader settles.
pub struct InflightWaiter {
    rx: Slot,
}

impl InflightWaiter {
    pub async fn wait(mut self) -> InflightOutcome {
        match self.rx.wait_for(|v| v.is_some()).await {
            Ok(v) => v.clone().unwrap_or(InflightOutcome::Abandoned),
            Err(_) => InflightOutcome::Abandoned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fingerprint;
    use crate::ErrorKind;

    fn fp(input: &str) -> Fingerprint {
        fingerprint(input, "m", "{}")
    }

    fn leader(a: Admission) -> InflightGuard {
        match a {
            Admission::Leader(g) => g,
            Admission::Follower(_) => panic!("expected leader"),
        }
    }

    fn follower(a: Admission) -> InflightWaiter {
        match a {
            Admission::Follower(w) => w,
            Admission::Leader(_) => panic!("expected follower"),
        }
    }

    #[tokio::test]
    async fn test_follower_receives_leader_text() {
        let registry = InflightRegistry::new();
        let guard = leader(registry.admit(&fp("a")));
        let waiter = follower(registry.admit(&fp("a")));
        assert_eq!(registry.len(), 1);

        let handle = tokio::spawn(waiter.wait());
        guard.complete("done");
        assert_eq!(handle.await.unwrap(), InflightOutcome::Completed("done".into()));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_shared() {
        let registry = InflightRegistry::new();
        let guard = leader(registry.admit(&fp("a")));
        let waiter = follower(registry.admit(&fp("a")));
        guard.fail(ErrorClassification::new(ErrorKind::Auth, "401"));
        match waiter.wait().await {
            InflightOutcome::Failed(c) => assert_eq!(c.kind, ErrorKind::Auth),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!registry.contains(&fp("a")));
    }

    #[tokio::test]
    async fn test_dropped_leader_releases_entry() {
        let registry = InflightRegistry::new();
        let guard = leader(registry.admit(&fp("a")));
        let waiter = follower(registry.admit(&fp("a")));
        drop(guard);
        assert_eq!(waiter.wait().await, InflightOutcome::Abandoned);
        assert!(registry.is_empty());
        // entry is free for a new leader
        let _again = leader(registry.admit(&fp("a")));
    }

    #[test]
    fn test_distinct_fingerprints_are_independent() {
        let registry = InflightRegistry::new();
        let _a = leader(registry.admit(&fp("a")));
        let _b = leader(registry.admit(&fp("b")));
        assert_eq!(registry.len(), 2);
    }
}
