use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

pub const PROVIDER_ID: &str = "openweather";

pub const MIN_HORIZON_DAYS: u8 = 1;
pub const MAX_HORIZON_DAYS: u8 = 5;
pub const DEFAULT_HORIZON_DAYS: u8 = 5;

/// Coordinates are keyed at 4 decimal places (roughly 11 m).
const COORD_SCALE: f64 = 10_000.0;

/// Validated, canonical coordinates.
///
/// Latitude and longitude are held as integer ten-thousandths of a degree so
/// that `12.9716`, `12.97160` and `12.971600001` all land on the same cache
/// entry, and `-0.0` collides with `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coordinates {
    lat_e4: i32,
    lon_e4: i32,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Result<Self, ValidationError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(ValidationError::Latitude(lat));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(ValidationError::Longitude(lon));
        }

        Ok(Self {
            lat_e4: canonical(lat),
            lon_e4: canonical(lon),
        })
    }

    pub fn lat(&self) -> f64 {
        f64::from(self.lat_e4) / COORD_SCALE
    }

    pub fn lon(&self) -> f64 {
        f64::from(self.lon_e4) / COORD_SCALE
    }
}

fn canonical(degrees: f64) -> i32 {
    // Range was checked by the caller, so the product fits comfortably in i32.
    (degrees * COORD_SCALE).round() as i32
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.lat(), self.lon())
    }
}

/// Forecast horizon in days, always within `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Horizon(u8);

impl Horizon {
    pub fn new(days: i64) -> Result<Self, ValidationError> {
        match u8::try_from(days) {
            Ok(d) if (MIN_HORIZON_DAYS..=MAX_HORIZON_DAYS).contains(&d) => Ok(Self(d)),
            _ => Err(ValidationError::Horizon(days)),
        }
    }

    pub fn days(&self) -> u8 {
        self.0
    }
}

impl Default for Horizon {
    fn default() -> Self {
        Self(DEFAULT_HORIZON_DAYS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Current,
    Forecast,
}

/// Identity of one cached payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Current(Coordinates),
    Forecast(Coordinates, Horizon),
}

impl CacheKey {
    pub fn kind(&self) -> DataKind {
        match self {
            CacheKey::Current(_) => DataKind::Current,
            CacheKey::Forecast(..) => DataKind::Forecast,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Current(coords) => write!(f, "{coords}|current"),
            CacheKey::Forecast(coords, horizon) => {
                write!(f, "{coords}|forecast_{}", horizon.days())
            }
        }
    }
}

/// Current conditions in the provider-agnostic schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedWeather {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, percent.
    pub humidity: u8,
    /// Millimetres over the last hour.
    pub rainfall: f64,
    /// Metres per second.
    pub wind_speed: f64,
    pub description: String,
    pub provider: String,
    pub cached: bool,
    #[serde(default)]
    pub stale: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u8,
    pub rainfall: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedForecast {
    /// One entry per calendar day, ascending by date.
    pub forecast: Vec<DailyForecast>,
    pub provider: String,
    pub cached: bool,
    #[serde(default)]
    pub stale: bool,
    pub timestamp: DateTime<Utc>,
}

/// What the cache stores and what `resolve` hands back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WeatherPayload {
    Current(NormalizedWeather),
    Forecast(NormalizedForecast),
}

impl WeatherPayload {
    pub fn is_cached(&self) -> bool {
        match self {
            WeatherPayload::Current(w) => w.cached,
            WeatherPayload::Forecast(f) => f.cached,
        }
    }

    pub fn is_stale(&self) -> bool {
        match self {
            WeatherPayload::Current(w) => w.stale,
            WeatherPayload::Forecast(f) => f.stale,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            WeatherPayload::Current(w) => w.timestamp,
            WeatherPayload::Forecast(f) => f.timestamp,
        }
    }

    /// Copy of the payload with freshness markers set for this read.
    pub fn with_freshness(&self, cached: bool, stale: bool) -> Self {
        let mut payload = self.clone();
        match &mut payload {
            WeatherPayload::Current(w) => {
                w.cached = cached;
                w.stale = stale;
            }
            WeatherPayload::Forecast(f) => {
                f.cached = cached;
                f.stale = stale;
            }
        }
        payload
    }
}
