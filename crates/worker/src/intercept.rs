//! Request routing: which requests the worker answers, and how.

use reqwest::{Method, header};
use url::Url;

use crate::fetch::same_origin;
use crate::request::Request;

/// Serving decision for one outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted; the request goes to the network untouched.
    Passthrough,
    NetworkFirst,
    CacheFirst,
}

/// Route a request issued by an application served from `origin`.
///
/// Only same-origin, non-ranged GETs are intercepted. Navigations go network-first so
/// shell changes show up immediately; everything else is cache-first.
pub fn route(request: &Request, origin: &Url) -> Route {
    if request.method != Method::GET {
        tracing::debug!(method = %request.method, url = %request.url, "passthrough: not a GET");
        return Route::Passthrough;
    }

    if request.headers.contains_key(header::RANGE) {
        tracing::debug!(url = %request.url, "passthrough: range request");
        return Route::Passthrough;
    }

    if !same_origin(&request.url, origin) {
        tracing::debug!(url = %request.url, "passthrough: cross-origin");
        return Route::Passthrough;
    }

    if request.is_navigation() { Route::NetworkFirst } else { Route::CacheFirst }
}
