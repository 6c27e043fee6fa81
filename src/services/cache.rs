//! TTL cache for per-account fetch results
//!
//! Keyed by (service kind, account id, query signature) so two accounts can
//! never collide on the same query. Entries carry their own TTL because
//! freshness differs per service: cost data can live for hours, realtime
//! session counts for minutes.
//!
//! Expiry is lazy on access; no background sweep is required for
//! correctness, though `sweep` can bound memory. Failed fetches never write
//! here, so a miss after a failure retries immediately instead of waiting
//! out a failure TTL.

use crate::types::{RawMetricResult, ServiceKind};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Cache key: one entry per account per distinct query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub service_kind: ServiceKind,
    pub account_id: String,
    pub signature: String,
}

impl CacheKey {
    pub fn new(service_kind: ServiceKind, account_id: &str, signature: &str) -> Self {
        Self {
            service_kind,
            account_id: account_id.to_string(),
            signature: signature.to_string(),
        }
    }
}

/// One cached fetch result with its insertion time and TTL
#[derive(Debug, Clone)]
struct CacheEntry {
    value: RawMetricResult,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired_at(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) > self.ttl
    }
}

/// In-memory TTL cache, safe for concurrent use from in-flight fetches.
///
/// Every operation is atomic at single-entry granularity; racing `put`s for
/// the same key resolve last-write-wins by insertion time, never by merge.
#[derive(Debug, Default)]
pub struct MetricCache {
    store: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl MetricCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh hit or nothing. Expired entries are purged on access.
    pub fn get(&self, key: &CacheKey) -> Option<RawMetricResult> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &CacheKey, now: Instant) -> Option<RawMetricResult> {
        let mut store = self.store.lock().expect("cache lock poisoned");
        match store.get(key) {
            Some(entry) if entry.is_expired_at(now) => {
                store.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Insert a successful fetch result. Only ever called on success.
    pub fn put(&self, key: CacheKey, value: RawMetricResult, ttl: Duration) {
        self.put_at(key, value, ttl, Instant::now());
    }

    fn put_at(&self, key: CacheKey, value: RawMetricResult, ttl: Duration, now: Instant) {
        let mut store = self.store.lock().expect("cache lock poisoned");
        let entry = CacheEntry {
            value,
            inserted_at: now,
            ttl,
        };
        match store.get(&key) {
            // Last-write-wins by insertion time
            Some(existing) if existing.inserted_at > now => {}
            _ => {
                store.insert(key, entry);
            }
        }
    }

    /// Drop a single entry
    pub fn invalidate(&self, key: &CacheKey) {
        let mut store = self.store.lock().expect("cache lock poisoned");
        store.remove(key);
    }

    /// Drop every entry for one account of one service, whatever the query.
    /// Used for manual refresh and enable/disable toggles; never a blanket
    /// flush of unrelated accounts.
    pub fn invalidate_account(&self, service_kind: ServiceKind, account_id: &str) {
        let mut store = self.store.lock().expect("cache lock poisoned");
        store.retain(|k, _| !(k.service_kind == service_kind && k.account_id == account_id));
    }

    /// Purge all expired entries. Optional; bounds memory between accesses.
    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    fn sweep_at(&self, now: Instant) {
        let mut store = self.store.lock().expect("cache lock poisoned");
        store.retain(|_, entry| !entry.is_expired_at(now));
    }

    pub fn len(&self) -> usize {
        self.store.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
