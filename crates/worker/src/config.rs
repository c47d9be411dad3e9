//! Per-version worker settings, resolved once from [`AppConfig`].

use shellcache_core::{AppConfig, Error, RequestKey, StoreName};
use url::Url;

use crate::fetch::resolve;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub store_name: StoreName,
    /// Application scope; its origin is the only one intercepted.
    pub origin: Url,
    /// Absolute URLs precached on install, in manifest order.
    pub manifest: Vec<Url>,
    pub root_document: Url,
}

impl WorkerConfig {
    pub fn new<I, S>(store_name: StoreName, origin: Url, manifest: I, root_document: &str) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let resolve_entry = |entry: &str| {
            resolve(&origin, entry).map_err(|e| Error::InvalidUrl(format!("{entry}: {e}")))
        };

        let manifest = manifest
            .into_iter()
            .map(|entry| resolve_entry(entry.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let root_document = resolve_entry(root_document)?;

        Ok(Self { store_name, origin, manifest, root_document })
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Self::new(config.store_name(), origin, &config.manifest, &config.root_document)
    }

    /// The same application at another deployment version.
    pub fn with_version(&self, version: &str) -> Self {
        Self { store_name: StoreName::new(self.store_name.prefix(), version), ..self.clone() }
    }

    pub fn version(&self) -> &str {
        self.store_name.version()
    }

    pub fn root_key(&self) -> RequestKey {
        RequestKey::get(&self.root_document)
    }
}
