//! In-process network double for strategy and lifecycle tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use shellcache_core::Error;
use url::Url;

use crate::fetch::Network;
use crate::request::{CacheMode, Request};
use crate::response::{Response, ResponseSource};

pub(crate) const ORIGIN: &str = "https://app.test/";

pub(crate) fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// Serves canned responses by URL; unknown URLs get a 404.
pub(crate) struct FakeNetwork {
    routes: Mutex<HashMap<String, (StatusCode, Bytes)>>,
    online: AtomicBool,
    calls: Mutex<Vec<(String, CacheMode)>>,
}

impl FakeNetwork {
    pub(crate) fn new() -> Self {
        Self { routes: Mutex::new(HashMap::new()), online: AtomicBool::new(true), calls: Mutex::new(Vec::new()) }
    }

    pub(crate) fn serve(&self, path: &str, status: StatusCode, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url(path).to_string(), (status, Bytes::from(body.to_string())));
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn calls(&self) -> Vec<(String, CacheMode)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls
            .lock()
            .unwrap()
            .push((request.url.to_string(), request.cache));

        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network("offline".to_string()));
        }

        let (status, body) = self
            .routes
            .lock()
            .unwrap()
            .get(request.url.as_str())
            .cloned()
            .unwrap_or((StatusCode::NOT_FOUND, Bytes::from_static(b"not found")));

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        Ok(Response { url: request.url.clone(), status, headers, body, source: ResponseSource::Network })
    }
}
