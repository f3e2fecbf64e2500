// src/error.rs
use thiserror::Error;

/// The response arrived but did not have the expected shape.
#[derive(Error, Debug)]
pub enum MalformedPayloadError {
    #[error("response body is empty")]
    EmptyBody,

    #[error("invalid snapshot payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unparseable timestamp {0:?}")]
    Timestamp(String),
}

/// Anything that stops a fetch from producing a snapshot. Caught at the engine
/// boundary, logged, and never allowed to touch tracked state.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to encode query: {0}")]
    Query(#[from] serde_urlencoded::ser::Error),

    #[error("server responded with status {status}")]
    Status { status: u16 },

    #[error("malformed payload: {0}")]
    Malformed(#[from] MalformedPayloadError),

    #[error("interval {0:?} is not supported")]
    UnsupportedInterval(String),
}
