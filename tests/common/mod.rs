//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use weather_gateway::{
    Clock, Coordinates, Horizon, ManualClock, RawPayload, UpstreamError, WeatherCache,
    WeatherProvider, WeatherService,
};

pub const TTL_SECS: u64 = 600;

// 2024-06-01T00:00:00Z
pub const DAY_ONE: i64 = 1_717_200_000;

#[derive(Debug, Clone)]
pub enum Behavior {
    Respond(serde_json::Value),
    Fail(UpstreamError),
    Hang,
}

/// Provider that answers from a script and counts every call.
pub struct FakeProvider {
    current: Mutex<Behavior>,
    forecast: Mutex<Behavior>,
    delay: Mutex<Option<Duration>>,
    current_calls: AtomicUsize,
    forecast_calls: AtomicUsize,
    configured: bool,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Behavior::Respond(current_body(24.3, "scattered clouds"))),
            forecast: Mutex::new(Behavior::Respond(forecast_body(5))),
            delay: Mutex::new(None),
            current_calls: AtomicUsize::new(0),
            forecast_calls: AtomicUsize::new(0),
            configured: true,
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn set_current(&self, behavior: Behavior) {
        *self.current.lock().unwrap() = behavior;
    }

    pub fn set_forecast(&self, behavior: Behavior) {
        *self.forecast.lock().unwrap() = behavior;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn current_calls(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }

    pub fn forecast_calls(&self) -> usize {
        self.forecast_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.current_calls() + self.forecast_calls()
    }

    async fn answer(&self, behavior: Behavior) -> Result<RawPayload, UpstreamError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match behavior {
            Behavior::Respond(body) => Ok(RawPayload {
                body,
                received_at: Utc::now(),
            }),
            Behavior::Fail(err) => Err(err),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Err(UpstreamError::Transport("hung request finished".into()))
            }
        }
    }
}

#[async_trait::async_trait]
impl WeatherProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn fetch_current(&self, _coords: Coordinates) -> Result<RawPayload, UpstreamError> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.current.lock().unwrap().clone();
        self.answer(behavior).await
    }

    async fn fetch_forecast(
        &self,
        _coords: Coordinates,
        _horizon: Horizon,
    ) -> Result<RawPayload, UpstreamError> {
        self.forecast_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.forecast.lock().unwrap().clone();
        self.answer(behavior).await
    }
}

pub struct Harness {
    pub service: Arc<WeatherService>,
    pub provider: Arc<FakeProvider>,
    pub clock: Arc<ManualClock>,
}

pub fn harness() -> Harness {
    harness_with(FakeProvider::new(), Duration::from_secs(5))
}

pub fn harness_with(provider: FakeProvider, timeout: Duration) -> Harness {
    let provider = Arc::new(provider);
    let clock = Arc::new(ManualClock::new(
        DateTime::from_timestamp(DAY_ONE, 0).unwrap(),
    ));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let cache = WeatherCache::new(TTL_SECS, None, dyn_clock.clone());
    let service = WeatherService::new(provider.clone(), cache, dyn_clock, timeout);

    Harness {
        service: Arc::new(service),
        provider,
        clock,
    }
}

pub fn current_body(temp: f64, description: &str) -> serde_json::Value {
    json!({
        "coord": {"lon": 77.5946, "lat": 12.9716},
        "weather": [{"id": 802, "main": "Clouds", "description": description}],
        "main": {"temp": temp, "humidity": 78},
        "wind": {"speed": 4.1},
        "rain": {"1h": 0.4},
        "dt": DAY_ONE,
        "name": "Bengaluru"
    })
}

/// Eight 3-hourly samples per day for `days` days.
pub fn forecast_body(days: i64) -> serde_json::Value {
    let list: Vec<_> = (0..days * 8)
        .map(|i| {
            json!({
                "dt": DAY_ONE + i * 3 * 3_600,
                "main": {"temp": 20.0 + (i % 8) as f64, "humidity": 55},
                "rain": {"3h": 0.25},
                "weather": [{"description": "light rain"}]
            })
        })
        .collect();
    json!({ "list": list, "city": {"timezone": 0} })
}
