//! Registry of open application instances and the version controlling each.

use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Open clients, each mapped to its controlling cache version (`None` while
/// uncontrolled).
#[derive(Debug, Default)]
pub struct Clients {
    inner: RwLock<HashMap<ClientId, Option<String>>>,
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a client. A client seen for the first time is controlled by
    /// `controller`; known clients keep their current controller.
    pub async fn register(&self, id: ClientId, controller: Option<&str>) -> Option<String> {
        let mut inner = self.inner.write().await;
        inner
            .entry(id)
            .or_insert_with(|| controller.map(String::from))
            .clone()
    }

    pub async fn remove(&self, id: &ClientId) -> bool {
        self.inner.write().await.remove(id).is_some()
    }

    pub async fn controller(&self, id: &ClientId) -> Option<String> {
        self.inner.read().await.get(id).cloned().flatten()
    }

    /// Take control of every registered client. Returns how many changed hands.
    pub async fn claim(&self, version: &str) -> usize {
        let mut inner = self.inner.write().await;
        let mut claimed = 0;
        for controller in inner.values_mut() {
            if controller.as_deref() != Some(version) {
                *controller = Some(version.to_string());
                claimed += 1;
            }
        }
        claimed
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
