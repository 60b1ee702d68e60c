use chrono::{DateTime, Duration, Utc};
use moka::ops::compute::{CompResult, Op};
use moka::sync::Cache;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::clock::Clock;
use crate::types::{CacheKey, WeatherPayload};

/// Longest TTL honoured; larger settings are capped so `stored_at + ttl`
/// cannot overflow.
const MAX_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub entry_count: u64,
    pub fresh_entries: u64,
    pub stale_entries: u64,
    pub max_capacity: Option<u64>,
    pub ttl_seconds: u64,
    pub keys: Vec<String>,
}

/// One stored payload. Never mutated after insertion; a refresh swaps in a
/// whole new `Arc<CacheEntry>`.
#[derive(Debug)]
pub struct CacheEntry {
    payload: WeatherPayload,
    fetch_started: DateTime<Utc>,
    stored_at: DateTime<Utc>,
    fresh_until: DateTime<Utc>,
}

impl CacheEntry {
    pub fn payload(&self) -> &WeatherPayload {
        &self.payload
    }

    pub fn fetch_started(&self) -> DateTime<Utc> {
        self.fetch_started
    }

    pub fn stored_at(&self) -> DateTime<Utc> {
        self.stored_at
    }

    pub fn fresh_until(&self) -> DateTime<Utc> {
        self.fresh_until
    }
}

#[derive(Debug, Clone)]
pub enum CacheLookup {
    Fresh(Arc<CacheEntry>),
    Stale(Arc<CacheEntry>),
    Absent,
}

impl CacheLookup {
    pub fn entry(&self) -> Option<&Arc<CacheEntry>> {
        match self {
            CacheLookup::Fresh(entry) | CacheLookup::Stale(entry) => Some(entry),
            CacheLookup::Absent => None,
        }
    }
}

/// In-memory store of normalized payloads.
///
/// Expiry is a read-time classification only. Nothing is evicted on TTL, so
/// an expired entry stays available as fallback material until a newer fetch
/// replaces it (or, when a capacity is configured, until the cache needs the
/// room).
pub struct WeatherCache {
    cache: Cache<CacheKey, Arc<CacheEntry>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    ttl_seconds: u64,
    max_capacity: Option<u64>,
}

impl WeatherCache {
    pub fn new(ttl_seconds: u64, max_capacity: Option<u64>, clock: Arc<dyn Clock>) -> Self {
        let mut builder = Cache::builder();
        if let Some(max) = max_capacity {
            builder = builder.max_capacity(max);
        }

        Self {
            cache: builder.build(),
            clock,
            ttl: Duration::seconds(ttl_seconds.min(MAX_TTL_SECONDS) as i64),
            ttl_seconds,
            max_capacity,
        }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub fn get(&self, key: &CacheKey) -> CacheLookup {
        let Some(entry) = self.cache.get(key) else {
            debug!("[CACHE MISS] {}", key);
            return CacheLookup::Absent;
        };

        if self.clock.now() < entry.fresh_until {
            debug!("[CACHE HIT] {}", key);
            CacheLookup::Fresh(entry)
        } else {
            debug!("[CACHE EXPIRED] {}", key);
            CacheLookup::Stale(entry)
        }
    }

    /// Store `payload` under `key`, fresh for one TTL from now.
    ///
    /// `fetch_started` is when the upstream request that produced the payload
    /// began. A write whose fetch started before the current entry's is
    /// dropped so a slow response cannot overwrite a newer one. Returns
    /// whether the write was applied.
    pub fn put(&self, key: CacheKey, payload: WeatherPayload, fetch_started: DateTime<Utc>) -> bool {
        let payload = payload.with_freshness(false, false);

        // The clock is read under the key's lock so accepted writes get
        // non-decreasing `stored_at` values.
        let result = self.cache.entry(key).and_compute_with(|existing| match existing {
            Some(current) if current.value().fetch_started > fetch_started => Op::Nop,
            _ => {
                let stored_at = self.clock.now();
                Op::Put(Arc::new(CacheEntry {
                    payload,
                    fetch_started,
                    stored_at,
                    fresh_until: stored_at + self.ttl,
                }))
            }
        });

        match result {
            CompResult::Inserted(_) | CompResult::ReplacedWith(_) => {
                debug!("[CACHE SET] {}", key);
                true
            }
            _ => {
                debug!("[CACHE SKIP] {} already holds a newer fetch", key);
                false
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks();

        let now = self.clock.now();
        let mut keys = Vec::new();
        let mut fresh_entries = 0;
        let mut stale_entries = 0;
        for (key, entry) in self.cache.iter() {
            if now < entry.fresh_until {
                fresh_entries += 1;
            } else {
                stale_entries += 1;
            }
            keys.push(key.to_string());
        }
        keys.sort();

        CacheStats {
            entry_count: self.cache.entry_count(),
            fresh_entries,
            stale_entries,
            max_capacity: self.max_capacity,
            ttl_seconds: self.ttl_seconds,
            keys,
        }
    }
}
