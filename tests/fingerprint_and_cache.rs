//! Fingerprint determinism/uniqueness and cache behaviour through the public API.

use prompt_refine::cache::{fingerprint, CacheConfig, RequestCache, FINGERPRINT_LEN};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Small deterministic generator (xorshift) so the sample is reproducible.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn word(&mut self) -> String {
        const WORDS: &[&str] = &[
            "add", "dark", "mode", "fix", "login", "bug", "refactor", "the", "settings", "panel",
            "toggle", "cache", "write", "tests", "for", "api", "client", "rename", "button",
        ];
        WORDS[(self.next() % WORDS.len() as u64) as usize].to_string()
    }

    fn sentence(&mut self) -> String {
        let n = 1 + (self.next() % 6) as usize;
        (0..n).map(|_| self.word()).collect::<Vec<_>>().join(" ")
    }
}

#[test]
fn test_fingerprint_is_pure_and_collision_free_over_sample() {
    let models = ["gpt-4o-mini", "gpt-4o", "claude-3-5-sonnet", "local"];
    let contexts = [
        r#"{"framework":null,"language":null}"#,
        r#"{"framework":"React","language":"TypeScript"}"#,
        r#"{"framework":"Axum","language":"Rust"}"#,
    ];
    let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);
    let mut seen: HashMap<String, (String, String, String)> = HashMap::new();
    let mut triples = HashSet::new();

    while triples.len() < 1_500 {
        let triple = (
            rng.sentence(),
            models[(rng.next() % models.len() as u64) as usize].to_string(),
            contexts[(rng.next() % contexts.len() as u64) as usize].to_string(),
        );
        if !triples.insert(triple.clone()) {
            continue;
        }
        let fp = fingerprint(&triple.0, &triple.1, &triple.2);
        assert_eq!(fp.as_str().len(), FINGERPRINT_LEN);
        assert_eq!(fp, fingerprint(&triple.0, &triple.1, &triple.2));
        if let Some(prev) = seen.insert(fp.to_string(), triple.clone()) {
            panic!("fingerprint collision between {prev:?} and {triple:?}");
        }
    }
}

#[test]
fn test_each_element_changes_the_fingerprint() {
    let base = fingerprint("add dark mode", "gpt-4o-mini", "{}");
    assert_ne!(base, fingerprint("add dark mode!", "gpt-4o-mini", "{}"));
    assert_ne!(base, fingerprint("add dark mode", "gpt-4o", "{}"));
    assert_ne!(base, fingerprint("add dark mode", "gpt-4o-mini", r#"{"framework":"React"}"#));
}

fn key(n: usize) -> prompt_refine::Fingerprint {
    fingerprint(&format!("request {n}"), "m", "{}")
}

#[test]
fn test_round_trip_counts_a_hit() {
    let cache = RequestCache::new(CacheConfig::new());
    cache.set(key(1), "refined", "m", 9);
    assert_eq!(cache.get(&key(1)).as_deref(), Some("refined"));
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (1, 0));
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_is_a_miss_and_removed() {
    let cache = RequestCache::new(CacheConfig::new().with_ttl(Duration::from_secs(60)));
    cache.set(key(1), "refined", "m", 9);
    tokio::time::advance(Duration::from_secs(61)).await;

    assert_eq!(cache.get(&key(1)), None);
    let stats = cache.stats();
    assert_eq!(stats.size, 0);
    assert_eq!(stats.misses, 1);
}

#[test]
fn test_touched_entry_survives_eviction() {
    let cache = RequestCache::new(CacheConfig::new().with_max_size(3));
    for n in 0..3 {
        cache.set(key(n), format!("v{n}"), "m", 1);
    }
    // key(0) is the oldest; touching it makes key(1) the victim
    assert!(cache.get(&key(0)).is_some());
    cache.set(key(3), "v3", "m", 1);

    assert_eq!(cache.len(), 3);
    assert!(cache.has(&key(0)));
    assert!(!cache.has(&key(1)));
    assert!(cache.has(&key(2)));
    assert!(cache.has(&key(3)));
}
