use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::cache::{CacheLookup, CacheStats, WeatherCache};
use crate::clock::Clock;
use crate::error::{FetchFailure, ResolveError, UpstreamError, ValidationError};
use crate::normalize::{normalize_current, normalize_forecast};
use crate::provider::{RawPayload, WeatherProvider};
use crate::types::{CacheKey, Coordinates, DataKind, Horizon, WeatherPayload};

type FetchOutcome = Result<WeatherPayload, FetchFailure>;

/// Cache-and-fetch front for one upstream provider.
///
/// Every request goes through [`WeatherService::resolve`]: serve a fresh
/// cache entry if there is one, otherwise fetch, normalize and store. When
/// the fetch fails, an expired entry is served instead (marked `stale`), and
/// only a key that was never cached surfaces an error.
///
/// Concurrent misses on the same key share a single upstream call.
pub struct WeatherService {
    provider: Arc<dyn WeatherProvider>,
    cache: WeatherCache,
    clock: Arc<dyn Clock>,
    request_timeout: Duration,
    in_flight: DashMap<CacheKey, Arc<OnceCell<FetchOutcome>>>,
}

impl WeatherService {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        cache: WeatherCache,
        clock: Arc<dyn Clock>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            clock,
            request_timeout,
            in_flight: DashMap::new(),
        }
    }

    /// Readiness probe: is the upstream credential present? No network.
    pub fn is_configured(&self) -> bool {
        self.provider.is_configured()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn cache_ttl_seconds(&self) -> u64 {
        self.cache.ttl_seconds()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Current conditions or a forecast for `(lat, lon)`.
    ///
    /// `horizon_days` must be in 1..=5 whenever it is given. It selects the
    /// forecast length (default 5) and has no effect on current conditions.
    pub async fn resolve(
        &self,
        lat: f64,
        lon: f64,
        kind: DataKind,
        horizon_days: Option<i64>,
    ) -> Result<WeatherPayload, ResolveError> {
        let key = cache_key(lat, lon, kind, horizon_days)?;

        if let CacheLookup::Fresh(entry) = self.cache.get(&key) {
            info!("📦 Returning cached data for {}", key);
            return Ok(entry.payload().with_freshness(true, false));
        }

        match self.fetch_shared(key).await {
            Ok(payload) => Ok(payload),
            Err(failure) => self.fall_back(key, failure),
        }
    }

    /// Join the in-flight fetch for `key`, or start one.
    async fn fetch_shared(&self, key: CacheKey) -> FetchOutcome {
        let cell = self
            .in_flight
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let outcome = cell.get_or_init(|| self.fetch_and_store(key)).await.clone();
        self.in_flight
            .remove_if(&key, |_, current| Arc::ptr_eq(current, &cell));
        outcome
    }

    async fn fetch_and_store(&self, key: CacheKey) -> FetchOutcome {
        // A fetch for this key may have landed between our lookup and now.
        if let CacheLookup::Fresh(entry) = self.cache.get(&key) {
            return Ok(entry.payload().with_freshness(true, false));
        }

        let started = self.clock.now();
        let payload = self.fetch_normalized(key).await?;
        if self.cache.put(key, payload.clone(), started) {
            info!("💾 Cached weather data for {}", key);
        }
        Ok(payload)
    }

    async fn fetch_normalized(&self, key: CacheKey) -> FetchOutcome {
        let raw = self.fetch_raw(key).await.map_err(|e| {
            warn!("❌ Upstream {} fetch for {} failed: {}", self.provider.name(), key, e);
            e
        })?;

        let normalized = match key {
            CacheKey::Current(_) => normalize_current(&raw).map(WeatherPayload::Current),
            CacheKey::Forecast(_, horizon) => {
                normalize_forecast(&raw, horizon).map(WeatherPayload::Forecast)
            }
        };

        normalized.map_err(|e| {
            error!(
                "🧩 {} payload for {} no longer matches the expected schema: {}",
                self.provider.name(),
                key,
                e
            );
            FetchFailure::from(e)
        })
    }

    async fn fetch_raw(&self, key: CacheKey) -> Result<RawPayload, UpstreamError> {
        let request = async {
            match key {
                CacheKey::Current(coords) => self.provider.fetch_current(coords).await,
                CacheKey::Forecast(coords, horizon) => {
                    self.provider.fetch_forecast(coords, horizon).await
                }
            }
        };

        tokio::time::timeout(self.request_timeout, request)
            .await
            .unwrap_or(Err(UpstreamError::Timeout(self.request_timeout)))
    }

    fn fall_back(&self, key: CacheKey, failure: FetchFailure) -> Result<WeatherPayload, ResolveError> {
        match self.cache.get(&key) {
            // Another request refreshed the key while ours was failing.
            CacheLookup::Fresh(entry) => Ok(entry.payload().with_freshness(true, false)),
            CacheLookup::Stale(entry) => {
                warn!(
                    "🔄 Serving stale data for {} (observed {}, stored {}) after failure: {}",
                    key,
                    entry.payload().timestamp(),
                    entry.stored_at(),
                    failure
                );
                Ok(entry.payload().with_freshness(true, true))
            }
            CacheLookup::Absent => Err(ResolveError::Unavailable {
                key,
                source: failure,
            }),
        }
    }
}

/// Validate inputs and build the canonical key. Touches nothing else.
pub fn cache_key(
    lat: f64,
    lon: f64,
    kind: DataKind,
    horizon_days: Option<i64>,
) -> Result<CacheKey, ValidationError> {
    let coords = Coordinates::new(lat, lon)?;
    let horizon = horizon_days.map(Horizon::new).transpose()?.unwrap_or_default();
    Ok(match kind {
        DataKind::Current => CacheKey::Current(coords),
        DataKind::Forecast => CacheKey::Forecast(coords, horizon),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_validates_before_building() {
        assert_eq!(
            cache_key(91.0, 0.0, DataKind::Current, None),
            Err(ValidationError::Latitude(91.0))
        );
        assert_eq!(
            cache_key(0.0, 0.0, DataKind::Forecast, Some(6)),
            Err(ValidationError::Horizon(6))
        );
        assert_eq!(
            cache_key(0.0, 0.0, DataKind::Current, Some(6)),
            Err(ValidationError::Horizon(6))
        );
        // A valid horizon does not split the current-conditions key.
        assert_eq!(
            cache_key(0.0, 0.0, DataKind::Current, Some(3)),
            cache_key(0.0, 0.0, DataKind::Current, None)
        );

        let key = cache_key(12.9716, 77.5946, DataKind::Forecast, None).unwrap();
        assert_eq!(key.to_string(), "12.9716,77.5946|forecast_5");
        assert_eq!(key.kind(), DataKind::Forecast);
    }
}
