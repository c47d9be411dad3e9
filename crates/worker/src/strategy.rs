//! Serving strategies.
//!
//! Both strategies write an independent snapshot of every 2xx network
//! response into the store before returning it; error responses are passed
//! to the caller but never stored.

use shellcache_core::{Error, RequestKey, Store};

use crate::fetch::Network;
use crate::request::Request;
use crate::response::Response;

async fn store_if_success(store: &Store, key: &RequestKey, response: &Response) -> Result<(), Error> {
    if response.is_success() {
        store.put(key, &response.to_snapshot()).await?;
    } else {
        tracing::debug!(url = %key.url, status = response.status.as_u16(), "not caching error response");
    }
    Ok(())
}

/// Serve from the store; go to the network only on a miss.
///
/// A network failure on a miss is returned as is.
pub async fn cache_first(store: &Store, network: &dyn Network, request: &Request) -> Result<Response, Error> {
    let key = request.key();

    if let Some(snapshot) = store.match_request(&key).await? {
        tracing::debug!(url = %request.url, store = store.name(), "cache hit");
        return Response::from_snapshot(snapshot);
    }

    tracing::debug!(url = %request.url, store = store.name(), "cache miss");
    let fresh = network.fetch(request).await?;
    store_if_success(store, &key, &fresh).await?;
    Ok(fresh)
}

/// Serve from the network; on failure fall back to the stored entry, then to
/// `root_document`.
///
/// The root fallback applies to every failed navigation whatever page was
/// asked for, so a multi-page app may get its shell instead of the page.
pub async fn network_first(
    store: &Store, network: &dyn Network, request: &Request, root_document: &RequestKey,
) -> Result<Response, Error> {
    let key = request.key();

    let err = match network.fetch(request).await {
        Ok(fresh) => {
            store_if_success(store, &key, &fresh).await?;
            return Ok(fresh);
        }
        Err(err) => err,
    };

    if let Some(snapshot) = store.match_request(&key).await? {
        tracing::warn!(url = %request.url, error = %err, "network failed, serving cached entry");
        return Response::from_snapshot(snapshot);
    }

    if let Some(snapshot) = store.match_request(root_document).await? {
        tracing::warn!(url = %request.url, root = %root_document.url, error = %err, "network failed, serving root document");
        return Response::from_snapshot(snapshot);
    }

    Err(err)
}
