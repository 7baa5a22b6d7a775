//! Error types for the clock.
//!
//! None of these escape the control loop: fetch and sync failures are logged
//! and the previous state is kept. Only `ConfigError` can stop the program,
//! and only at startup.

use thiserror::Error;

/// Failure fetching or decoding a weather report.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("weather request failed: {0}")]
    Http(#[source] reqwest::Error),
    #[error("weather payload is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The request URL carries the API token, and reqwest prints the URL in its
/// `Display`. These errors end up in the log, so the URL is dropped here.
impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Http(e.without_url())
    }
}

/// Failure synchronizing the wall clock against a network time source.
#[derive(Debug, Error)]
pub enum TimeSyncError {
    #[error("time request failed: {0}")]
    Http(#[source] reqwest::Error),
    #[error("time payload is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unrecognized datetime {value:?}: {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },
}

impl From<reqwest::Error> for TimeSyncError {
    fn from(e: reqwest::Error) -> Self {
        TimeSyncError::Http(e.without_url())
    }
}

/// Invalid or unreadable startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid color {0:?} (expected #RRGGBB or 0xRRGGBB)")]
    Color(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A BDF font file that could not be read or understood.
#[derive(Debug, Error)]
pub enum FontError {
    #[error("could not read font {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("font {0} has no FONTBOUNDINGBOX")]
    MissingBoundingBox(String),
}
