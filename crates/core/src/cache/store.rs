//! Versioned store operations.
//!
//! A [`Store`] is one named key-value area inside [`CacheStorage`], mapping a
//! [`RequestKey`] to the [`Snapshot`] of the response that answered it.

use super::connection::CacheStorage;
use super::hash::compute_cache_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

/// Identity of a cached request: method plus absolute URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: &str, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self { method: method.to_ascii_uppercase(), url: url.into() }
    }

    /// Identity of a GET request for `url`.
    pub fn get(url: &Url) -> Self {
        Self::new("GET", url)
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Storage key for this identity.
    pub fn hash(&self) -> String {
        compute_cache_key(&self.method, &self.url)
    }
}

/// Point-in-time, replayable copy of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// URL the response was finally served from (after redirects).
    pub final_url: String,
    pub status: u16,
    /// Header names with their raw value bytes, in response order.
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

/// Handle to a single named store.
#[derive(Clone, Debug)]
pub struct Store {
    storage: CacheStorage,
    name: String,
}

impl CacheStorage {
    /// Open the store called `name`, creating it if absent.
    pub async fn open_store(&self, name: &str) -> Result<Store, Error> {
        let owned = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO stores (name, created_at) VALUES (?1, ?2)",
                    params![owned, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(Store { storage: self.clone(), name: name.to_string() })
    }

    /// Names of every persisted store, across all versions, sorted.
    pub async fn list_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM stores ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM stores WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a whole store and all of its entries.
    ///
    /// Returns false if no store had that name; that is not an error.
    pub async fn delete_by_name(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM stores WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}

impl Store {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up the snapshot stored for `key`.
    ///
    /// A miss is `Ok(None)`. Non-GET identities always miss.
    pub async fn match_request(&self, key: &RequestKey) -> Result<Option<Snapshot>, Error> {
        if !key.is_get() {
            return Ok(None);
        }

        let store = self.name.clone();
        let hash = key.hash();
        self.storage
            .conn
            .call(move |conn| -> Result<Option<Snapshot>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT final_url, status, headers_json, body, stored_at
                     FROM entries WHERE store = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![store, hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                });

                match result {
                    Ok((final_url, status, headers_json, body, stored_at)) => {
                        let headers = serde_json::from_str(&headers_json)
                            .map_err(|e| Error::InvalidInput(format!("corrupt headers for cached entry: {e}")))?;
                        Ok(Some(Snapshot { final_url, status, headers, body, stored_at }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or overwrite the snapshot for `key`. Last write wins.
    pub async fn put(&self, key: &RequestKey, snapshot: &Snapshot) -> Result<(), Error> {
        self.put_all(&[(key.clone(), snapshot.clone())]).await
    }

    /// Write a batch of entries in a single transaction: all or nothing.
    pub async fn put_all(&self, entries: &[(RequestKey, Snapshot)]) -> Result<(), Error> {
        let mut rows = Vec::with_capacity(entries.len());
        for (key, snapshot) in entries {
            if !key.is_get() {
                return Err(Error::UnsupportedMethod(key.method.clone()));
            }
            let headers_json = serde_json::to_string(&snapshot.headers)
                .map_err(|e| Error::InvalidInput(format!("failed to serialize headers: {e}")))?;
            rows.push((key.hash(), key.clone(), headers_json, snapshot.clone()));
        }

        let store = self.name.clone();
        self.storage
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for (hash, key, headers_json, snapshot) in &rows {
                    tx.execute(
                        "INSERT INTO entries (
                            store, key_hash, method, url, final_url, status, headers_json, body, stored_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                        ON CONFLICT(store, key_hash) DO UPDATE SET
                            final_url = excluded.final_url,
                            status = excluded.status,
                            headers_json = excluded.headers_json,
                            body = excluded.body,
                            stored_at = excluded.stored_at",
                        params![
                            &store,
                            hash,
                            &key.method,
                            &key.url,
                            &snapshot.final_url,
                            snapshot.status,
                            headers_json,
                            &snapshot.body,
                            &snapshot.stored_at,
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Every identity stored in this store, ordered by URL.
    pub async fn keys(&self) -> Result<Vec<RequestKey>, Error> {
        let store = self.name.clone();
        self.storage
            .conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM entries WHERE store = ?1 ORDER BY url")?;
                let keys = stmt
                    .query_map(params![store], |row| Ok(RequestKey { method: row.get(0)?, url: row.get(1)? }))?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn len(&self) -> Result<usize, Error> {
        let store = self.name.clone();
        self.storage
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE store = ?1", params![store], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }
}
