use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use weather_gateway::{
    http, Clock, Config, OpenWeatherProvider, SystemClock, WeatherCache, WeatherService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::load()?;
    if config.openweather_api_key.is_none() {
        warn!("⚠️  OPENWEATHER_API_KEY is not set; requests will fail unless cached");
    }

    let timeout = Duration::from_secs(config.request_timeout_secs);
    let provider = OpenWeatherProvider::new(
        config.openweather_api_key.clone(),
        config.openweather_base_url.clone(),
        timeout,
    )?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = WeatherCache::new(config.cache_ttl_secs, config.cache_max_entries, clock.clone());
    let service = Arc::new(WeatherService::new(Arc::new(provider), cache, clock, timeout));

    let app = http::router(service);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("🦀 Weather gateway starting on http://{}", addr);
    info!("⚡ Cache TTL: {} seconds", config.cache_ttl_secs);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
