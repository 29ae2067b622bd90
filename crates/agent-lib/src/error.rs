//! Error types shared across the pipeline

use std::time::Duration;
use thiserror::Error;

/// A single exposition line that could not be turned into a sample
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("invalid metric name")]
    InvalidName,

    #[error("unterminated label set")]
    UnterminatedLabels,

    #[error("malformed label pair: {0}")]
    MalformedLabel(String),

    #[error("duplicate label key: {0}")]
    DuplicateLabel(String),

    #[error("missing sample value")]
    MissingValue,

    #[error("invalid sample value: {0}")]
    InvalidValue(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("unexpected trailing content: {0}")]
    TrailingContent(String),
}

/// Failure to fetch exposition text from a metrics endpoint
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid metrics url {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("timed out fetching {url} after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("could not connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("metrics endpoint {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to read response body from {url}: {message}")]
    Body { url: String, message: String },
}

/// Failure to read a log source
#[derive(Error, Debug)]
pub enum LogSourceError {
    #[error("log source not found: {0}")]
    NotFound(String),

    #[error("failed to read log source {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out reading log source {path} after {timeout:?}")]
    Timeout { path: String, timeout: Duration },
}

/// Failure of the generative text capability
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("model unavailable: {message}")]
    Unavailable { message: String },

    #[error("model rate limit exceeded")]
    RateLimited,

    #[error("malformed model response: {message}")]
    MalformedResponse { message: String },

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("model API error (HTTP {status}): {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl GenerationError {
    /// True when the failure means no model is configured at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, GenerationError::Unavailable { .. })
    }
}

/// Top-level errors surfaced to callers of the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("unknown agent: {0} (expected one of health, reliability, investigator, alert)")]
    UnknownAgent(String),

    #[error("upstream unavailable: {0}")]
    Upstream(#[from] FetchError),
}

impl PipelineError {
    /// True for structurally invalid requests, false for upstream failures
    pub fn is_bad_request(&self) -> bool {
        matches!(self, PipelineError::UnknownAgent(_))
    }
}
