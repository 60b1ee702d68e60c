//! Weather gateway: a cache-and-fetch front for the OpenWeather free tier.
//!
//! Requests are served from an in-memory cache while entries are fresh,
//! refreshed from upstream once they expire, and answered from the expired
//! entry (marked `stale`) when upstream is failing. Provider payloads are
//! normalized into one stable schema before they are cached.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod normalize;
pub mod provider;
pub mod service;
pub mod types;

pub use cache::{CacheEntry, CacheLookup, CacheStats, WeatherCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{FetchFailure, NormalizationError, ResolveError, UpstreamError, ValidationError};
pub use provider::{OpenWeatherProvider, RawPayload, WeatherProvider};
pub use service::WeatherService;
pub use types::*;
