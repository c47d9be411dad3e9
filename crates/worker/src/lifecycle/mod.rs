//! Worker lifecycle: install, activate, message and fetch handling.
//!
//! A [`Worker`] serves exactly one cache version. It moves through
//! `Parsed → Installing → Installed → Activating → Activated`, or ends up
//! `Redundant` when its install fails or a newer version replaces it.
//! [`Registration`] decides when a worker is promoted.

pub mod clients;
pub mod message;
pub mod registration;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::try_join_all;
use shellcache_core::{CacheStorage, Error, RequestKey, Store};
use tokio::sync::RwLock;

pub use clients::{ClientId, Clients};
pub use message::WorkerMessage;
pub use registration::Registration;

use crate::config::WorkerConfig;
use crate::fetch::Network;
use crate::intercept::{Route, route};
use crate::request::Request;
use crate::response::Response;
use crate::strategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting to activate.
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Result of a fetch event.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted; the caller sends the request to the network itself.
    Passthrough,
    Respond(Response),
}

/// One deployed cache version.
pub struct Worker {
    config: Arc<WorkerConfig>,
    storage: CacheStorage,
    network: Arc<dyn Network>,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("store", &self.config.store_name.to_string())
            .field("skip_waiting", &self.wants_skip_waiting())
            .finish_non_exhaustive()
    }
}

impl Worker {
    pub fn new(config: Arc<WorkerConfig>, storage: CacheStorage, network: Arc<dyn Network>) -> Self {
        Self { config, storage, network, state: RwLock::new(WorkerState::Parsed), skip_waiting: AtomicBool::new(false) }
    }

    /// A fresh worker for another version of the same application, sharing
    /// this one's storage and network.
    pub fn for_version(&self, version: &str) -> Self {
        Self::new(Arc::new(self.config.with_version(version)), self.storage.clone(), self.network.clone())
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn version(&self) -> &str {
        self.config.version()
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Ask to be activated without waiting for old clients to go away.
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn wants_skip_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    async fn transition(&self, from: WorkerState, to: WorkerState) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if *state != from {
            return Err(Error::InvalidState { expected: from.to_string(), actual: state.to_string() });
        }
        *state = to;
        Ok(())
    }

    async fn set_state(&self, to: WorkerState) {
        *self.state.write().await = to;
    }

    /// Open the current store.
    pub async fn store(&self) -> Result<Store, Error> {
        self.storage.open_store(&self.config.store_name.to_string()).await
    }

    /// Install event: precache the whole manifest, then ask to skip waiting.
    ///
    /// Any unreachable or non-2xx asset fails the install and leaves the
    /// store without any of the manifest entries; the worker turns redundant.
    pub async fn install(&self) -> Result<(), Error> {
        self.transition(WorkerState::Parsed, WorkerState::Installing).await?;
        tracing::info!(store = %self.config.store_name, assets = self.config.manifest.len(), "installing");

        match self.precache().await {
            Ok(()) => {
                self.set_state(WorkerState::Installed).await;
                self.skip_waiting();
                tracing::info!(store = %self.config.store_name, "installed");
                Ok(())
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant).await;
                tracing::error!(store = %self.config.store_name, error = %e, "install failed");
                Err(e)
            }
        }
    }

    /// Restart event: adopt the store left by an earlier run of this same
    /// version instead of precaching again.
    ///
    /// Succeeds when the store was the last one activated, or when every
    /// manifest entry is already stored; otherwise the worker is left `Parsed`
    /// and `false` is returned so it can be installed.
    pub async fn resume(&self) -> Result<bool, Error> {
        self.transition(WorkerState::Parsed, WorkerState::Installing).await?;

        match self.stored_intact().await {
            Ok(true) => {
                self.set_state(WorkerState::Installed).await;
                self.skip_waiting();
                tracing::info!(store = %self.config.store_name, "resumed from existing store");
                Ok(true)
            }
            Ok(false) => {
                self.set_state(WorkerState::Parsed).await;
                Ok(false)
            }
            Err(e) => {
                self.set_state(WorkerState::Parsed).await;
                Err(e)
            }
        }
    }

    async fn stored_intact(&self) -> Result<bool, Error> {
        let name = &self.config.store_name;
        if !self.storage.has_store(&name.to_string()).await? {
            tracing::debug!(store = %name, "no store, install required");
            return Ok(false);
        }

        // An activated store was complete, whatever manifest it was built from.
        if self.storage.last_activated(name.prefix()).await?.as_deref() == Some(name.version()) {
            return Ok(true);
        }

        let store = self.store().await?;
        for url in &self.config.manifest {
            if store.match_request(&RequestKey::get(url)).await?.is_none() {
                tracing::debug!(store = %name, missing = %url, "store incomplete, install required");
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn precache(&self) -> Result<(), Error> {
        let store = self.store().await?;
        let network = self.network.as_ref();

        let fetches = self.config.manifest.iter().map(|url| async move {
            let request = Request::get(url.clone()).reload();
            let response = network
                .fetch(&request)
                .await
                .map_err(|e| Error::PrecacheFailed { url: url.to_string(), reason: e.to_string() })?;
            if !response.is_success() {
                return Err(Error::PrecacheFailed {
                    url: url.to_string(),
                    reason: format!("status {}", response.status.as_u16()),
                });
            }
            Ok::<_, Error>((request.key(), response.to_snapshot()))
        });

        let entries = try_join_all(fetches).await?;
        store.put_all(&entries).await
    }

    /// Activate event: delete every other version's store, record this one as
    /// the active version, then claim all clients.
    ///
    /// Returns the number of stores deleted. On failure the worker goes back to
    /// `Installed` so activation can be retried.
    pub async fn activate(&self, clients: &Clients) -> Result<usize, Error> {
        self.transition(WorkerState::Installed, WorkerState::Activating).await?;
        tracing::info!(store = %self.config.store_name, "activating");

        let result = async {
            let deleted = self.collect_stale_stores().await?;
            self.storage.record_activation(&self.config.store_name).await?;
            Ok::<_, Error>(deleted)
        }
        .await;

        match result {
            Ok(deleted) => {
                let claimed = clients.claim(self.version()).await;
                self.set_state(WorkerState::Activated).await;
                tracing::info!(store = %self.config.store_name, deleted, claimed, "activated");
                Ok(deleted)
            }
            Err(e) => {
                self.set_state(WorkerState::Installed).await;
                tracing::error!(store = %self.config.store_name, error = %e, "activation failed");
                Err(e)
            }
        }
    }

    async fn collect_stale_stores(&self) -> Result<usize, Error> {
        let names = self.storage.list_names().await?;
        let stale: Vec<&String> = names
            .iter()
            .filter(|name| self.config.store_name.is_stale(name))
            .collect();

        let deletions = stale.iter().map(|name| async move {
            let deleted = self.storage.delete_by_name(name).await?;
            tracing::info!(store = %name, "deleted stale store");
            Ok::<bool, Error>(deleted)
        });

        let results = try_join_all(deletions).await?;
        Ok(results.into_iter().filter(|deleted| *deleted).count())
    }

    /// Mark this worker as replaced by a newer version.
    pub async fn retire(&self) {
        self.set_state(WorkerState::Redundant).await;
    }

    /// Message event. Messages are never answered.
    pub fn handle_message(&self, message: WorkerMessage) {
        match message {
            WorkerMessage::SkipWaiting => {
                tracing::info!(store = %self.config.store_name, "skip waiting requested");
                self.skip_waiting();
            }
        }
    }

    /// Fetch event: route the request and run the chosen strategy to completion.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, Error> {
        let route = route(request, &self.config.origin);
        tracing::debug!(method = %request.method, url = %request.url, ?route, "fetch");

        let response = match route {
            Route::Passthrough => return Ok(FetchOutcome::Passthrough),
            Route::CacheFirst => {
                let store = self.store().await?;
                strategy::cache_first(&store, self.network.as_ref(), request).await?
            }
            Route::NetworkFirst => {
                let store = self.store().await?;
                strategy::network_first(&store, self.network.as_ref(), request, &self.config.root_key()).await?
            }
        };

        Ok(FetchOutcome::Respond(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNetwork, ORIGIN, url};
    use crate::request::CacheMode;
    use reqwest::{Method, StatusCode};
    use shellcache_core::StoreName;
    use url::Url;

    fn worker_config(version: &str, manifest: &[&str]) -> Arc<WorkerConfig> {
        Arc::new(
            WorkerConfig::new(
                StoreName::new("app", version),
                Url::parse(ORIGIN).unwrap(),
                manifest.iter().copied(),
                "./index.html",
            )
            .unwrap(),
        )
    }

    fn serve_shell(network: &FakeNetwork) {
        network.serve("./index.html", StatusCode::OK, "<main>shell</main>");
        network.serve("./app.js", StatusCode::OK, "boot()");
    }

    #[tokio::test]
    async fn test_install_precaches_manifest() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::new());
        serve_shell(&network);
        let worker = Worker::new(worker_config("v1", &["./index.html", "./app.js"]), storage.clone(), network.clone());

        worker.install().await.unwrap();

        assert_eq!(worker.state().await, WorkerState::Installed);
        assert!(worker.wants_skip_waiting());
        let store = storage.open_store("app-v1").await.unwrap();
        assert_eq!(store.len().await.unwrap(), 2);
        assert!(network.calls().iter().all(|(_, mode)| *mode == CacheMode::Reload));
    }

    #[tokio::test]
    async fn test_install_fails_atomically() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::new());
        serve_shell(&network);
        let worker = Worker::new(
            worker_config("v1", &["./index.html", "./app.js", "./icon-512.png"]),
            storage.clone(),
            network,
        );

        let result = worker.install().await;

        assert!(matches!(result, Err(Error::PrecacheFailed { url, reason }) if url.ends_with("icon-512.png") && reason == "status 404"));
        assert_eq!(worker.state().await, WorkerState::Redundant);
        assert!(!worker.wants_skip_waiting());
        let store = storage.open_store("app-v1").await.unwrap();
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_install_offline_fails() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::new());
        network.set_online(false);
        let worker = Worker::new(worker_config("v1", &["./index.html"]), storage, network);

        let result = worker.install().await;
        assert!(matches!(result, Err(Error::PrecacheFailed { reason, .. }) if reason.contains("NETWORK_ERROR")));
    }

    #[tokio::test]
    async fn test_install_twice_is_invalid() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::new());
        serve_shell(&network);
        let worker = Worker::new(worker_config("v1", &["./index.html"]), storage, network);

        worker.install().await.unwrap();
        assert!(matches!(worker.install().await, Err(Error::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_resume_complete_store_skips_network() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::new());
        serve_shell(&network);
        let first = Worker::new(worker_config("v1", &["./index.html", "./app.js"]), storage.clone(), network.clone());
        first.install().await.unwrap();
        let calls = network.call_count();

        network.set_online(false);
        let restarted = Worker::new(worker_config("v1", &["./index.html", "./app.js"]), storage, network.clone());

        assert!(restarted.resume().await.unwrap());
        assert_eq!(restarted.state().await, WorkerState::Installed);
        assert_eq!(network.call_count(), calls);
    }

    #[tokio::test]
    async fn test_resume_incomplete_store_needs_install() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::new());
        serve_shell(&network);
        let worker = Worker::new(worker_config("v1", &["./index.html", "./app.js"]), storage, network);

        assert!(!worker.resume().await.unwrap());
        assert_eq!(worker.state().await, WorkerState::Parsed);
        worker.install().await.unwrap();
    }

    #[tokio::test]
    async fn test_activate_requires_install() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let worker = Worker::new(worker_config("v1", &["./index.html"]), storage, Arc::new(FakeNetwork::new()));

        let result = worker.activate(&Clients::new()).await;
        assert!(matches!(result, Err(Error::InvalidState { expected, actual }) if expected == "installed" && actual == "parsed"));
    }

    #[tokio::test]
    async fn test_activate_deletes_only_stale_prefixed_stores() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        storage.open_store("app-v0").await.unwrap();
        storage.open_store("app-v1").await.unwrap();
        storage.open_store("other-v1").await.unwrap();
        let network = Arc::new(FakeNetwork::new());
        serve_shell(&network);
        let worker = Worker::new(worker_config("v2", &["./index.html"]), storage.clone(), network);
        let clients = Clients::new();
        clients.register(ClientId::new("tab-1"), Some("v1")).await;

        worker.install().await.unwrap();
        let deleted = worker.activate(&clients).await.unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(worker.state().await, WorkerState::Activated);
        assert_eq!(storage.list_names().await.unwrap(), vec!["app-v2".to_string(), "other-v1".to_string()]);
        assert_eq!(clients.controller(&ClientId::new("tab-1")).await, Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_activated_store_resumes_with_other_manifest() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::new());
        serve_shell(&network);
        let worker = Worker::new(worker_config("v1", &["./index.html", "./app.js"]), storage.clone(), network.clone());
        worker.install().await.unwrap();
        worker.activate(&Clients::new()).await.unwrap();
        assert_eq!(storage.last_activated("app").await.unwrap().as_deref(), Some("v1"));

        network.set_online(false);
        let restored = Worker::new(worker_config("v1", &["./index.html", "./chart.js"]), storage, network);

        assert!(restored.resume().await.unwrap());
        assert_eq!(restored.state().await, WorkerState::Installed);
    }

    #[tokio::test]
    async fn test_message_sets_skip_waiting() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let worker = Worker::new(worker_config("v1", &["./index.html"]), storage, Arc::new(FakeNetwork::new()));

        assert!(!worker.wants_skip_waiting());
        worker.handle_message(WorkerMessage::SkipWaiting);
        assert!(worker.wants_skip_waiting());
    }

    #[tokio::test]
    async fn test_fetch_routes_by_classification() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::new());
        serve_shell(&network);
        let worker = Worker::new(worker_config("v1", &["./index.html", "./app.js"]), storage, network.clone());
        worker.install().await.unwrap();
        worker.activate(&Clients::new()).await.unwrap();
        let after_install = network.call_count();

        // cached static asset: no network
        let outcome = worker.handle_fetch(&Request::get(url("./app.js"))).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Respond(ref r) if &r.body[..] == b"boot()"));
        assert_eq!(network.call_count(), after_install);

        // navigation: always asks the network first
        let outcome = worker.handle_fetch(&Request::navigate(url("./index.html"))).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Respond(_)));
        assert_eq!(network.call_count(), after_install + 1);
    }

    #[tokio::test]
    async fn test_fetch_never_stores_passthrough_requests() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::new());
        serve_shell(&network);
        let worker = Worker::new(worker_config("v1", &["./index.html"]), storage.clone(), network);
        worker.install().await.unwrap();

        let post = Request::new(Method::POST, url("./api/save"));
        let cross = Request::get(Url::parse("https://cdn.test/chart.js").unwrap());
        assert!(matches!(worker.handle_fetch(&post).await.unwrap(), FetchOutcome::Passthrough));
        assert!(matches!(worker.handle_fetch(&cross).await.unwrap(), FetchOutcome::Passthrough));

        let keys = storage.open_store("app-v1").await.unwrap().keys().await.unwrap();
        assert_eq!(keys, vec![RequestKey::get(&url("./index.html"))]);
    }
}
