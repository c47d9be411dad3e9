//! Responses handed back to the application, and their stored snapshots.

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use shellcache_core::{Error, Snapshot};
use url::Url;

/// Where a response's bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    /// The final URL after redirects
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl Response {
    /// 2xx responses other than 206; only these are ever written to a store.
    ///
    /// A partial body must never stand in for the full resource.
    pub fn is_success(&self) -> bool {
        self.status.is_success() && self.status != StatusCode::PARTIAL_CONTENT
    }

    /// Independent copy of this response for storage.
    pub fn to_snapshot(&self) -> Snapshot {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect();

        Snapshot {
            final_url: self.url.to_string(),
            status: self.status.as_u16(),
            headers,
            body: self.body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Rebuild a response from a stored snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, Error> {
        let url = Url::parse(&snapshot.final_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let status = StatusCode::from_u16(snapshot.status)
            .map_err(|e| Error::InvalidInput(format!("cached status {}: {e}", snapshot.status)))?;

        let mut headers = HeaderMap::with_capacity(snapshot.headers.len());
        for (name, value) in &snapshot.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::InvalidInput(format!("cached header name {name}: {e}")))?;
            let value = HeaderValue::from_bytes(value)
                .map_err(|e| Error::InvalidInput(format!("cached header value for {name}: {e}")))?;
            headers.append(name, value);
        }

        Ok(Self { url, status, headers, body: Bytes::from(snapshot.body), source: ResponseSource::Cache })
    }
}
