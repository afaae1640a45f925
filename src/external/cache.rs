//! External-data cache (§4.6): `(source, marketId, params) → CachedData`,
//! with configurable TTL/staleTTL/maxSize, pluggable eviction policy, and
//! optional compression of large entries.
//!
//! Storage is a `parking_lot::RwLock<HashMap<..>>` rather than a
//! lock-free map: the teacher protects every mutable shared cache with a
//! short critical section (refill+consume in the rate limiter, read+write
//! here) instead of reaching for a concurrent-map crate, so this follows
//! suit.

use crate::clock::SharedClock;
use crate::config::{CacheConfig, EvictionPolicy};
use chrono::Duration as ChronoDuration;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Evicted,
}

#[derive(Clone)]
struct Entry {
    bytes: Vec<u8>,
    compressed: bool,
    inserted_at_ms: i64,
    ttl_ms: i64,
    stale_ttl_ms: i64,
    hit_count: u64,
    last_accessed_ms: i64,
}

impl Entry {
    fn freshness(&self, now_ms: i64) -> Freshness {
        let age = now_ms - self.inserted_at_ms;
        if age <= self.ttl_ms {
            Freshness::Fresh
        } else if age <= self.ttl_ms + self.stale_ttl_ms {
            Freshness::Stale
        } else {
            Freshness::Evicted
        }
    }
}

/// Deterministic cache key: endpoint-specific prefix plus a hash of the
/// variable parameters, with any array-valued parameter sorted first so
/// request permutations collapse to the same key.
pub fn cache_key(source: &str, market_id: &str, params: &[(&str, Vec<String>)]) -> String {
    let mut sorted_params: Vec<(&str, Vec<String>)> = params.to_vec();
    sorted_params.sort_by_key(|(k, _)| *k);
    for (_, values) in sorted_params.iter_mut() {
        values.sort();
    }

    let mut hasher = DefaultHasher::new();
    for (k, values) in &sorted_params {
        k.hash(&mut hasher);
        values.hash(&mut hasher);
    }
    let digest = hasher.finish();
    format!("{source}:{market_id}:{digest:016x}")
}

pub struct Cache {
    config: CacheConfig,
    clock: SharedClock,
    entries: RwLock<HashMap<String, Entry>>,
}

impl Cache {
    pub fn new(config: CacheConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert<T: Serialize>(&self, key: &str, value: &T, ttl: ChronoDuration, stale_ttl: ChronoDuration) {
        let json = serde_json::to_vec(value).unwrap_or_default();
        let (bytes, compressed) = self.maybe_compress(&json);
        let now_ms = self.clock.now().timestamp_millis();

        let mut entries = self.entries.write();
        if !entries.contains_key(key) && entries.len() >= self.config.max_size {
            Self::evict_one(&mut entries, self.config.eviction_policy);
        }

        entries.insert(
            key.to_string(),
            Entry {
                bytes,
                compressed,
                inserted_at_ms: now_ms,
                ttl_ms: ttl.num_milliseconds(),
                stale_ttl_ms: stale_ttl.num_milliseconds(),
                hit_count: 0,
                last_accessed_ms: now_ms,
            },
        );
    }

    fn maybe_compress(&self, json: &[u8]) -> (Vec<u8>, bool) {
        if !self.config.enable_compression || json.len() < self.config.compression_threshold_bytes {
            return (json.to_vec(), false);
        }
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        if encoder.write_all(json).is_err() {
            return (json.to_vec(), false);
        }
        match encoder.finish() {
            Ok(compressed) if compressed.len() * 5 <= json.len() * 4 => (compressed, true),
            _ => (json.to_vec(), false),
        }
    }

    fn decompress(entry: &Entry) -> Vec<u8> {
        if !entry.compressed {
            return entry.bytes.clone();
        }
        let mut decoder = ZlibDecoder::new(entry.bytes.as_slice());
        let mut out = Vec::new();
        if decoder.read_to_end(&mut out).is_ok() {
            out
        } else {
            Vec::new()
        }
    }

    /// Returns `(value, freshness)` for any entry that isn't fully evicted.
    /// `None` means no entry at all, or one that has fully expired past
    /// `ttl + stale_ttl`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<(T, Freshness)> {
        let now_ms = self.clock.now().timestamp_millis();

        {
            let entries = self.entries.read();
            let entry = entries.get(key)?;
            let freshness = entry.freshness(now_ms);
            if freshness != Freshness::Evicted {
                let bytes = Self::decompress(entry);
                if let Ok(value) = serde_json::from_slice(&bytes) {
                    drop(entries);
                    let mut entries = self.entries.write();
                    if let Some(entry) = entries.get_mut(key) {
                        entry.hit_count += 1;
                        entry.last_accessed_ms = now_ms;
                    }
                    return Some((value, freshness));
                }
                return None;
            }
        }

        self.entries.write().remove(key);
        None
    }

    /// Only a fresh hit counts as "fresh cache hit" for the fetch decision
    /// order's step (1); stale entries are reached separately via
    /// `get_stale`.
    pub fn get_fresh<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.get::<T>(key) {
            Some((v, Freshness::Fresh)) => Some(v),
            _ => None,
        }
    }

    pub fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.get::<T>(key) {
            Some((v, Freshness::Stale)) => Some(v),
            _ => None,
        }
    }

    fn evict_one(entries: &mut HashMap<String, Entry>, policy: EvictionPolicy) {
        let victim = match policy {
            EvictionPolicy::Lru => entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed_ms)
                .map(|(k, _)| k.clone()),
            EvictionPolicy::Lfu => entries
                .iter()
                .min_by_key(|(_, e)| e.hit_count)
                .map(|(k, _)| k.clone()),
            EvictionPolicy::Ttl => entries
                .iter()
                .min_by_key(|(_, e)| e.ttl_ms)
                .map(|(k, _)| k.clone()),
        };
        if let Some(key) = victim {
            entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use chrono::Utc;
    use std::sync::Arc;

    fn cache_with(config: CacheConfig) -> (Cache, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::new(Utc::now()));
        (Cache::new(config, clock.clone()), clock)
    }

    #[test]
    fn key_is_stable_across_param_permutations() {
        let k1 = cache_key("news", "m1", &[("tags", vec!["b".into(), "a".into()])]);
        let k2 = cache_key("news", "m1", &[("tags", vec!["a".into(), "b".into()])]);
        assert_eq!(k1, k2);
    }

    #[test]
    fn fresh_then_stale_then_evicted() {
        let (cache, clock) = cache_with(CacheConfig::default());
        cache.insert(
            "k",
            &"value".to_string(),
            ChronoDuration::minutes(15),
            ChronoDuration::minutes(60),
        );
        assert_eq!(cache.get::<String>("k").unwrap().1, Freshness::Fresh);

        clock.advance(ChronoDuration::minutes(20));
        assert_eq!(cache.get::<String>("k").unwrap().1, Freshness::Stale);
        assert!(cache.get_fresh::<String>("k").is_none());
        assert_eq!(cache.get_stale::<String>("k").unwrap(), "value");

        clock.advance(ChronoDuration::minutes(60));
        assert!(cache.get::<String>("k").is_none());
    }

    #[test]
    fn compression_keeps_only_real_savings() {
        let mut config = CacheConfig::default();
        config.enable_compression = true;
        config.compression_threshold_bytes = 10;
        let (cache, _clock) = cache_with(config);

        let repetitive = "a".repeat(5000);
        cache.insert(
            "big",
            &repetitive,
            ChronoDuration::minutes(15),
            ChronoDuration::minutes(60),
        );
        let entries = cache.entries.read();
        let entry = entries.get("big").unwrap();
        assert!(entry.compressed);
        assert!(entry.bytes.len() < repetitive.len());
    }

    #[test]
    fn evicts_when_over_capacity() {
        let mut config = CacheConfig::default();
        config.max_size = 2;
        config.eviction_policy = EvictionPolicy::Lru;
        let (cache, clock) = cache_with(config);

        cache.insert("a", &1, ChronoDuration::minutes(15), ChronoDuration::minutes(60));
        clock.advance(ChronoDuration::seconds(1));
        cache.insert("b", &2, ChronoDuration::minutes(15), ChronoDuration::minutes(60));
        let _ = cache.get::<i32>("b");
        clock.advance(ChronoDuration::seconds(1));
        cache.insert("c", &3, ChronoDuration::minutes(15), ChronoDuration::minutes(60));

        assert_eq!(cache.len(), 2);
        assert!(cache.get::<i32>("a").is_none());
    }
}
