//! Network access for the worker.
//!
//! Strategies and the lifecycle only see the [`Network`] trait; the real
//! implementation is [`FetchClient`], a thin reqwest wrapper that:
//!
//! - forwards method, headers and body unchanged (hop-by-hop headers dropped)
//! - sends `Cache-Control: no-cache` / `Pragma: no-cache` for [`CacheMode::Reload`]
//! - follows up to 5 redirects
//! - enforces a maximum body size
//!
//! Non-2xx responses are returned as responses, not errors; deciding what to
//! cache is the strategies' job.

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use url::{UrlError, resolve, same_origin};

use crate::request::{CacheMode, Request};
use crate::response::{Response, ResponseSource};
use shellcache_core::{AppConfig, Error};

/// Request headers that describe the incoming hop rather than the request.
const HOP_BY_HOP: &[header::HeaderName] = &[
    header::HOST,
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::TE,
];

/// Something that can answer a request from the network.
#[async_trait]
pub trait Network: Send + Sync {
    /// Fetch `request`. `Err` means no response at all (offline, DNS, reset).
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "shellcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 50MB)
    pub max_bytes: usize,

    /// Request timeout (default: none)
    pub timeout: Option<Duration>,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "shellcache/0.1".to_string(), max_bytes: 50 * 1024 * 1024, timeout: None, max_redirects: 5 }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// HTTP fetch client.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn map_send_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(err.to_string())
    } else {
        Error::Network(err.to_string())
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        let mut headers = request.headers.clone();
        for name in HOP_BY_HOP {
            headers.remove(name);
        }
        if request.cache == CacheMode::Reload {
            headers.insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-cache"));
            headers.insert(header::PRAGMA, header::HeaderValue::from_static("no-cache"));
        }

        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(map_send_error)?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let body = response.bytes().await.map_err(map_send_error)?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            "fetched {} {} -> {} {} in {}ms ({} bytes)",
            request.method,
            request.url,
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(Response { url: final_url, status, headers, body, source: ResponseSource::Network })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::routing::{get, post};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn echo_cache_control(headers: AxumHeaders) -> String {
        let cache_control = headers
            .get("cache-control")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let pragma = headers.get("pragma").and_then(|v| v.to_str().ok()).unwrap_or("");
        format!("{cache_control}|{pragma}")
    }

    async fn start_origin() -> SocketAddr {
        let app = Router::new()
            .route("/index.html", get(|| async { ([("content-type", "text/html")], "<h1>shell</h1>") }))
            .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "gone") }))
            .route("/headers", get(echo_cache_control))
            .route("/echo", post(|body: String| async move { body }))
            .route("/big", get(|| async { vec![0u8; 4096] }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn url_for(addr: SocketAddr, path: &str) -> ::url::Url {
        ::url::Url::parse(&format!("http://{addr}{path}")).unwrap()
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "shellcache/0.1");
        assert_eq!(config.max_bytes, 50 * 1024 * 1024);
        assert_eq!(config.timeout, None);
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { timeout_ms: Some(1500), max_bytes: 1024, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.max_bytes, 1024);
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let addr = start_origin().await;
        let client = FetchClient::new(FetchConfig::default()).unwrap();

        let response = client.fetch(&Request::get(url_for(addr, "/index.html"))).await.unwrap();
        assert!(response.is_success());
        assert_eq!(response.source, ResponseSource::Network);
        assert_eq!(&response.body[..], b"<h1>shell</h1>");
        assert_eq!(response.headers.get(header::CONTENT_TYPE).unwrap(), "text/html");
    }

    #[tokio::test]
    async fn test_fetch_error_status_is_a_response() {
        let addr = start_origin().await;
        let client = FetchClient::new(FetchConfig::default()).unwrap();

        let response = client.fetch(&Request::get(url_for(addr, "/missing"))).await.unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_reload_bypasses_intermediate_caches() {
        let addr = start_origin().await;
        let client = FetchClient::new(FetchConfig::default()).unwrap();

        let plain = client.fetch(&Request::get(url_for(addr, "/headers"))).await.unwrap();
        assert_eq!(&plain.body[..], b"|");

        let reload = client
            .fetch(&Request::get(url_for(addr, "/headers")).reload())
            .await
            .unwrap();
        assert_eq!(&reload.body[..], b"no-cache|no-cache");
    }

    #[tokio::test]
    async fn test_fetch_forwards_body() {
        let addr = start_origin().await;
        let client = FetchClient::new(FetchConfig::default()).unwrap();

        let mut request = Request::new(reqwest::Method::POST, url_for(addr, "/echo"));
        request.body = bytes::Bytes::from_static(b"payload");
        let response = client.fetch(&request).await.unwrap();
        assert_eq!(&response.body[..], b"payload");
    }

    #[tokio::test]
    async fn test_fetch_too_large() {
        let addr = start_origin().await;
        let client = FetchClient::new(FetchConfig { max_bytes: 1024, ..Default::default() }).unwrap();

        let result = client.fetch(&Request::get(url_for(addr, "/big"))).await;
        assert!(matches!(result, Err(Error::FetchTooLarge(_))));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let result = client.fetch(&Request::get(url_for(addr, "/index.html"))).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }
}
