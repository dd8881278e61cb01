//! Error types for the proxy pipeline.
//!
//! `ProxyError` is what a request handler returns; it renders itself as the
//! short plain-text responses callers see.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Why a caller-supplied target was refused before any network access.
#[derive(Debug, Error)]
pub enum InvalidUrl {
    #[error("missing or empty url parameter")]
    Empty,

    #[error("malformed percent-encoding in url parameter")]
    BadEncoding,

    #[error("unparseable url: {0}")]
    Malformed(#[from] url::ParseError),

    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("url has no host")]
    MissingHost,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(e)
        }
    }
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid target: {0}")]
    InvalidUrl(#[from] InvalidUrl),

    #[error("fetch failed: {0}")]
    FetchFailed(#[from] FetchError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            ProxyError::FetchFailed(FetchError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::FetchFailed(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Text shown to the caller. Transport details stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            ProxyError::InvalidUrl(_) => "Invalid URL.",
            ProxyError::FetchFailed(_) => "Failed to fetch URL.",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, status = %self.status(), "proxy request failed");
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.public_message(),
        )
            .into_response()
    }
}
