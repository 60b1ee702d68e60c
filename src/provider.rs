use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::UpstreamError;
use crate::types::{Coordinates, Horizon, PROVIDER_ID};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

const MAX_ERROR_BODY_CHARS: usize = 500;

/// Provider-shaped response body, exactly as received.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub body: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

/// Pure transport to one upstream weather service. Implementations know
/// nothing about caching and never retry.
#[async_trait::async_trait]
pub trait WeatherProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Whether a credential is present. Never touches the network.
    fn is_configured(&self) -> bool;

    async fn fetch_current(&self, coords: Coordinates) -> Result<RawPayload, UpstreamError>;

    async fn fetch_forecast(
        &self,
        coords: Coordinates,
        horizon: Horizon,
    ) -> Result<RawPayload, UpstreamError>;
}

/// OpenWeather free tier: Current Weather 2.5 and the 5 day / 3 hour forecast.
pub struct OpenWeatherProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl OpenWeatherProvider {
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.filter(|key| !key.is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    async fn get_json(&self, endpoint: &str, coords: Coordinates) -> Result<RawPayload, UpstreamError> {
        let api_key = self.api_key.as_deref().ok_or(UpstreamError::NotConfigured)?;
        let url = format!("{}/{}", self.base_url, endpoint);
        let params = [
            ("lat", coords.lat().to_string()),
            ("lon", coords.lon().to_string()),
            ("appid", api_key.to_string()),
            ("units", "metric".to_string()),
        ];

        info!("🌤️  Fetching {} from OpenWeather for {}", endpoint, coords);
        let start = Instant::now();

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            warn!("❌ OpenWeather {} returned HTTP {}", endpoint, status.as_u16());
            return Err(status_error(status, &body));
        }

        let body = serde_json::from_slice(&bytes)
            .map_err(|e| UpstreamError::MalformedResponse(e.to_string()))?;

        info!(
            "✅ OpenWeather {} responded in {:.2}s",
            endpoint,
            start.elapsed().as_secs_f64()
        );

        Ok(RawPayload {
            body,
            received_at: Utc::now(),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> UpstreamError {
        if e.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else {
            UpstreamError::Transport(e.to_string())
        }
    }
}

fn status_error(status: StatusCode, body: &str) -> UpstreamError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => UpstreamError::RateLimited,
        StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => {
            let message = serde_json::from_str::<ErrorBody>(body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| truncate(body));
            UpstreamError::NotFound(message)
        }
        _ => UpstreamError::Status {
            status: status.as_u16(),
            body: truncate(body),
        },
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[async_trait::async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn name(&self) -> &str {
        PROVIDER_ID
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch_current(&self, coords: Coordinates) -> Result<RawPayload, UpstreamError> {
        self.get_json("weather", coords).await
    }

    async fn fetch_forecast(
        &self,
        coords: Coordinates,
        horizon: Horizon,
    ) -> Result<RawPayload, UpstreamError> {
        // The free endpoint always returns the full 5 days; trimming to the
        // horizon happens during normalization.
        debug!("forecast horizon {} days for {}", horizon.days(), coords);
        self.get_json("forecast", coords).await
    }
}
