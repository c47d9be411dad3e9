//! HTTP front for the worker.
//!
//! Every request reaching the proxy is a fetch event from an application
//! instance, except the two control routes under `/__shellcache/`.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, to_bytes},
    extract::{Request as HttpRequest, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response as HttpResponse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use shellcache_worker::fetch::same_origin;
use shellcache_worker::{ClientId, FetchOutcome, Network, Registration, Request, RequestMode, Response, WorkerMessage};
use url::Url;

use crate::error::ProxyError;

/// Optional request header identifying the application instance.
pub const CLIENT_HEADER: &str = "x-shellcache-client";

/// Response header telling whether the body came from the network or the cache.
pub const SOURCE_HEADER: &str = "x-shellcache-source";

#[derive(Clone)]
pub struct ProxyState {
    pub registration: Arc<Registration>,
    /// Used for requests the worker does not intercept.
    pub network: Arc<dyn Network>,
    pub origin: Url,
    pub max_body_bytes: usize,
    /// Whether absolute-form requests may name other origins.
    pub allow_forward: bool,
}

/// Worker status as reported by `GET /__shellcache/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusOutput {
    pub active_version: Option<String>,
    pub waiting_version: Option<String>,
    pub clients: usize,
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/__shellcache/message", post(message_handler))
        .route("/__shellcache/status", get(status_handler))
        .fallback(fetch_handler)
        .with_state(state)
}

async fn fetch_handler(State(state): State<ProxyState>, req: HttpRequest) -> Result<HttpResponse, ProxyError> {
    let request = to_worker_request(&state, req).await?;

    if let Some(id) = client_id(&request.headers) {
        let controller = state.registration.active_version().await;
        state.registration.clients().register(id, controller.as_deref()).await;
    }

    let response = match state.registration.handle_fetch(&request).await? {
        FetchOutcome::Respond(response) => response,
        FetchOutcome::Passthrough => state.network.fetch(&request).await?,
    };

    Ok(into_http(response))
}

async fn message_handler(
    State(state): State<ProxyState>, Json(payload): Json<serde_json::Value>,
) -> Result<StatusCode, ProxyError> {
    if let Some(message) = WorkerMessage::parse(&payload) {
        state.registration.post_message(message).await?;
    }
    Ok(StatusCode::ACCEPTED)
}

async fn status_handler(State(state): State<ProxyState>) -> Json<StatusOutput> {
    let registration = &state.registration;
    Json(StatusOutput {
        active_version: registration.active_version().await,
        waiting_version: registration.waiting_version().await,
        clients: registration.clients().len().await,
    })
}

fn client_id(headers: &HeaderMap) -> Option<ClientId> {
    headers
        .get(CLIENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(ClientId::new)
}

fn request_mode(headers: &HeaderMap) -> RequestMode {
    match headers.get("sec-fetch-mode").and_then(|v| v.to_str().ok()) {
        Some("navigate") => RequestMode::Navigate,
        Some("cors") => RequestMode::Cors,
        Some("no-cors") => RequestMode::NoCors,
        _ => RequestMode::SameOrigin,
    }
}

/// Absolute-form URIs are taken as is, and must name the application origin
/// unless forwarding is allowed. Origin-form paths always stay on the
/// application origin.
async fn to_worker_request(state: &ProxyState, req: HttpRequest) -> Result<Request, ProxyError> {
    let (parts, body) = req.into_parts();

    let url = if parts.uri.scheme().is_some() {
        let url = Url::parse(&parts.uri.to_string())
            .map_err(|e| ProxyError::InvalidUrl(format!("{}: {e}", parts.uri)))?;
        if !state.allow_forward && !same_origin(&url, &state.origin) {
            return Err(ProxyError::ForwardDenied(url.to_string()));
        }
        url
    } else {
        let mut url = state.origin.clone();
        url.set_path(parts.uri.path());
        url.set_query(parts.uri.query());
        url
    };

    let body = to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| ProxyError::InvalidBody(e.to_string()))?;

    let mut request = Request::new(parts.method, url);
    request.mode = request_mode(&parts.headers);
    request.headers = parts.headers;
    request.body = body;
    Ok(request)
}

fn into_http(response: Response) -> HttpResponse {
    let mut headers = response.headers;
    for name in [header::TRANSFER_ENCODING, header::CONTENT_LENGTH, header::CONNECTION] {
        headers.remove(name);
    }
    headers.insert(SOURCE_HEADER, HeaderValue::from_static(response.source.as_str()));

    (response.status, headers, Body::from(response.body)).into_response()
}
