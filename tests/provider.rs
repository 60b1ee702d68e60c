//! Integration tests for OpenWeatherProvider using wiremock.

use std::time::Duration;
use weather_gateway::{Coordinates, Horizon, OpenWeatherProvider, UpstreamError, WeatherProvider};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> OpenWeatherProvider {
    OpenWeatherProvider::new(
        Some("test-key".to_string()),
        server.uri(),
        Duration::from_millis(500),
    )
    .unwrap()
}

fn bengaluru() -> Coordinates {
    Coordinates::new(12.9716, 77.5946).unwrap()
}

#[tokio::test]
async fn test_fetch_current_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("lat", "12.9716"))
        .and(query_param("lon", "77.5946"))
        .and(query_param("appid", "test-key"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "coord": {"lon": 77.5946, "lat": 12.9716},
            "main": {"temp": 24.3, "humidity": 78}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let raw = provider(&mock_server).fetch_current(bengaluru()).await.unwrap();
    assert_eq!(raw.body["main"]["temp"], 24.3);
}

#[tokio::test]
async fn test_fetch_forecast_hits_forecast_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("lat", "12.9716"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "cod": "200",
            "list": []
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let raw = provider(&mock_server)
        .fetch_forecast(bengaluru(), Horizon::new(3).unwrap())
        .await
        .unwrap();
    assert!(raw.body["list"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_rate_limited() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&mock_server)
        .await;

    let err = provider(&mock_server).fetch_current(bengaluru()).await.unwrap_err();
    assert_eq!(err, UpstreamError::RateLimited);
}

#[tokio::test]
async fn test_invalid_location() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "cod": "400",
            "message": "wrong latitude"
        })))
        .mount(&mock_server)
        .await;

    let err = provider(&mock_server).fetch_current(bengaluru()).await.unwrap_err();
    assert_eq!(err, UpstreamError::NotFound("wrong latitude".to_string()));
}

#[tokio::test]
async fn test_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&mock_server)
        .await;

    let err = provider(&mock_server).fetch_current(bengaluru()).await.unwrap_err();
    assert_eq!(
        err,
        UpstreamError::Status {
            status: 503,
            body: "maintenance".to_string()
        }
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_malformed_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let err = provider(&mock_server).fetch_current(bengaluru()).await.unwrap_err();
    assert!(matches!(err, UpstreamError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let err = provider(&mock_server).fetch_current(bengaluru()).await.unwrap_err();
    assert_eq!(err, UpstreamError::Timeout(Duration::from_millis(500)));
}

#[tokio::test]
async fn test_connection_refused() {
    // Nothing listens on port 9 of localhost.
    let provider = OpenWeatherProvider::new(
        Some("test-key".to_string()),
        "http://127.0.0.1:9",
        Duration::from_secs(2),
    )
    .unwrap();

    let err = provider.fetch_current(bengaluru()).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Transport(_)));
}

#[tokio::test]
async fn test_missing_key_makes_no_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let provider =
        OpenWeatherProvider::new(None, mock_server.uri(), Duration::from_secs(1)).unwrap();
    assert!(!provider.is_configured());

    let err = provider.fetch_current(bengaluru()).await.unwrap_err();
    assert_eq!(err, UpstreamError::NotConfigured);
}
