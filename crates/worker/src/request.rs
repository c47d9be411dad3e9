//! Outgoing requests as seen by the interceptor.

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{self, HeaderMap, HeaderValue};
use shellcache_core::RequestKey;
use url::Url;

/// How the request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level page navigation.
    Navigate,
    #[default]
    SameOrigin,
    Cors,
    NoCors,
}

/// Interaction with intermediate HTTP caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    /// Always revalidate with the origin; used for precaching.
    Reload,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub mode: RequestMode,
    pub cache: CacheMode,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            mode: RequestMode::default(),
            cache: CacheMode::default(),
            body: Bytes::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// A top-level navigation to `url`, as a browser would send it.
    pub fn navigate(url: Url) -> Self {
        let mut request = Self::get(url);
        request.mode = RequestMode::Navigate;
        request
            .headers
            .insert(header::ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml,*/*;q=0.8"));
        request
    }

    /// Bypass intermediate caches for this request.
    pub fn reload(mut self) -> Self {
        self.cache = CacheMode::Reload;
        self
    }

    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Cache identity of this request.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method.as_str(), &self.url)
    }

    /// Navigational requests are page loads or anything that accepts HTML.
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
            || self
                .headers
                .get_all(header::ACCEPT)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .any(|accept| accept.contains("text/html"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse("https://app.test/").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_navigate_mode_is_navigation() {
        let mut request = Request::navigate(url("/about"));
        request.headers.clear();
        assert!(request.is_navigation());
    }

    #[test]
    fn test_accept_html_is_navigation() {
        let request = Request::get(url("/partial"))
            .with_header(header::ACCEPT, HeaderValue::from_static("text/html;q=0.9"));
        assert!(request.is_navigation());
    }

    #[test]
    fn test_static_request() {
        let request =
            Request::get(url("/app.js")).with_header(header::ACCEPT, HeaderValue::from_static("*/*"));
        assert!(!request.is_navigation());
        assert!(!Request::get(url("/icon-192.png")).is_navigation());
    }

    #[test]
    fn test_key_drops_fragment() {
        let request = Request::get(url("/index.html#section"));
        assert_eq!(request.key().url, "https://app.test/index.html");
        assert_eq!(request.key().method, "GET");
    }

    #[test]
    fn test_reload() {
        let request = Request::get(url("/sw.js")).reload();
        assert_eq!(request.cache, CacheMode::Reload);
    }
}
