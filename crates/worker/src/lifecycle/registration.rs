//! Active/waiting bookkeeping for successive worker versions.

use std::sync::Arc;

use shellcache_core::Error;
use tokio::sync::{Mutex, RwLock};

use super::{Clients, FetchOutcome, Worker, WorkerMessage, WorkerState};
use crate::request::Request;

/// Holds the worker currently serving requests and the one waiting to take over.
#[derive(Debug, Default)]
pub struct Registration {
    active: RwLock<Option<Arc<Worker>>>,
    waiting: Mutex<Option<Arc<Worker>>>,
    clients: Clients,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clients(&self) -> &Clients {
        &self.clients
    }

    pub async fn active(&self) -> Option<Arc<Worker>> {
        self.active.read().await.clone()
    }

    pub async fn active_version(&self) -> Option<String> {
        self.active.read().await.as_ref().map(|w| w.version().to_string())
    }

    pub async fn waiting_version(&self) -> Option<String> {
        self.waiting.lock().await.as_ref().map(|w| w.version().to_string())
    }

    /// Install `worker`, then activate it if it asked to skip waiting or if
    /// nothing is active yet.
    ///
    /// A failed install leaves the current active worker serving.
    pub async fn register(&self, worker: Arc<Worker>) -> Result<WorkerState, Error> {
        worker.install().await?;

        let replaced = self.waiting.lock().await.replace(worker.clone());
        if let Some(replaced) = replaced {
            replaced.retire().await;
        }

        self.activate_waiting().await?;
        Ok(worker.state().await)
    }

    /// Re-adopt `worker` from a store completed by an earlier run of the same
    /// version. Returns false when the store is incomplete and
    /// [`register`](Self::register) is needed instead.
    pub async fn restore(&self, worker: Arc<Worker>) -> Result<bool, Error> {
        if !worker.resume().await? {
            return Ok(false);
        }

        self.waiting.lock().await.replace(worker);
        self.activate_waiting().await
    }

    /// Start-up sequence for a new process: adopt `worker` if its store is
    /// already complete; otherwise bring back the last activated version and
    /// install `worker` on top of it.
    ///
    /// When that install fails the restored version keeps serving and the
    /// install error is returned.
    pub async fn boot(&self, worker: Arc<Worker>) -> Result<WorkerState, Error> {
        if self.restore(worker.clone()).await? {
            return Ok(worker.state().await);
        }

        let name = &worker.config().store_name;
        if let Some(version) = worker.storage.last_activated(name.prefix()).await?
            && version != name.version()
        {
            let previous = Arc::new(worker.for_version(&version));
            if self.restore(previous).await? {
                tracing::info!(version = %version, "restored previously active version");
            }
        }

        self.register(worker).await
    }

    /// Deliver a message. It goes to the waiting worker when there is one,
    /// which may promote it immediately.
    pub async fn post_message(&self, message: WorkerMessage) -> Result<bool, Error> {
        let waiting = self.waiting.lock().await.clone();
        match waiting {
            Some(worker) => {
                worker.handle_message(message);
                self.activate_waiting().await
            }
            None => {
                if let Some(active) = self.active().await {
                    active.handle_message(message);
                }
                Ok(false)
            }
        }
    }

    /// Promote the waiting worker if it is eligible. Returns whether it was.
    async fn activate_waiting(&self) -> Result<bool, Error> {
        let mut waiting = self.waiting.lock().await;
        let Some(worker) = waiting.clone() else {
            return Ok(false);
        };

        let has_active = self.active.read().await.is_some();
        if has_active && !worker.wants_skip_waiting() {
            tracing::debug!(version = worker.version(), "worker waiting for clients to release the old version");
            return Ok(false);
        }

        let previous = self.active.write().await.replace(worker.clone());
        if let Err(e) = worker.activate(&self.clients).await {
            *self.active.write().await = previous;
            return Err(e);
        }

        waiting.take();
        if let Some(previous) = previous {
            previous.retire().await;
        }
        Ok(true)
    }

    /// Fetch event from a client. Without an active worker nothing is intercepted.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, Error> {
        match self.active().await {
            Some(worker) => worker.handle_fetch(request).await,
            None => Ok(FetchOutcome::Passthrough),
        }
    }
}
