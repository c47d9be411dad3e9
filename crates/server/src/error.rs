//! Structured errors for the shellcache proxy.
//!
//! Maps worker and store failures onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shellcache_core::Error;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Request URI could not be mapped onto an absolute URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Absolute-form request for another origin while forwarding is off.
    #[error("FORWARD_DENIED: {0}")]
    ForwardDenied(String),

    /// Request body could not be read.
    #[error("INVALID_INPUT: {0}")]
    InvalidBody(String),

    #[error(transparent)]
    Worker(#[from] Error),
}

impl ProxyError {
    fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidUrl(_) | ProxyError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::ForwardDenied(_) => StatusCode::FORBIDDEN,
            ProxyError::Worker(Error::FetchTimeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Worker(e) if e.is_network() => StatusCode::BAD_GATEWAY,
            ProxyError::Worker(Error::InvalidUrl(_) | Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ProxyError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}
