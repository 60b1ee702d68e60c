//! Error taxonomy for the weather gateway.
//!
//! Validation errors are caller mistakes and always propagate. Upstream and
//! normalization errors are transient from the caller's point of view: they
//! are absorbed when a stale cache entry exists and only surface as
//! [`ResolveError::Unavailable`] when nothing was ever cached for the key.

use thiserror::Error;

use crate::types::CacheKey;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("latitude {0} is outside -90..=90")]
    Latitude(f64),

    #[error("longitude {0} is outside -180..=180")]
    Longitude(f64),

    #[error("forecast days {0} is outside 1..=5")]
    Horizon(i64),
}

/// A failed upstream fetch. Cloneable so one failure can be handed to every
/// caller waiting on the same in-flight request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UpstreamError {
    #[error("upstream request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("upstream rate limit exceeded")]
    RateLimited,

    #[error("upstream rejected location: {0}")]
    NotFound(String),

    #[error("failed to reach upstream: {0}")]
    Transport(String),

    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream response is not valid JSON: {0}")]
    MalformedResponse(String),

    #[error("upstream API key is not configured")]
    NotConfigured,
}

impl UpstreamError {
    /// Whether retrying later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Timeout(_) | UpstreamError::RateLimited | UpstreamError::Transport(_) => {
                true
            }
            UpstreamError::Status { status, .. } => *status >= 500,
            UpstreamError::NotFound(_)
            | UpstreamError::MalformedResponse(_)
            | UpstreamError::NotConfigured => false,
        }
    }
}

/// The provider answered, but not in the shape we understand.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizationError {
    #[error("payload does not match the provider schema: {0}")]
    Schema(String),

    #[error("field `{field}` has an impossible value: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("forecast payload contains no samples")]
    EmptyForecast,
}

/// Anything that stopped a fetch from producing a cacheable payload.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchFailure {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),
}

impl FetchFailure {
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchFailure::Upstream(e) => e.is_retryable(),
            FetchFailure::Normalization(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("no cached data for {key} and the upstream fetch failed: {source}")]
    Unavailable {
        key: CacheKey,
        #[source]
        source: FetchFailure,
    },
}

impl ResolveError {
    /// `true` for "try again later", `false` for "this request will never work".
    pub fn is_retryable(&self) -> bool {
        match self {
            ResolveError::Validation(_) => false,
            ResolveError::Unavailable { source, .. } => source.is_retryable(),
        }
    }
}
