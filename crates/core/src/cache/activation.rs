//! Record of the last activated version per application.

use super::connection::CacheStorage;
use super::naming::StoreName;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

impl CacheStorage {
    /// Remember `name` as the version serving its application.
    ///
    /// The store must exist. The record is dropped along with the store.
    pub async fn record_activation(&self, name: &StoreName) -> Result<(), Error> {
        let prefix = name.prefix().to_string();
        let store = name.to_string();
        let version = name.version().to_string();
        let activated_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO activations (prefix, store, version, activated_at) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(prefix) DO UPDATE SET
                        store = excluded.store,
                        version = excluded.version,
                        activated_at = excluded.activated_at",
                    params![prefix, store, version, activated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Version last activated under `prefix`, if its store still exists.
    pub async fn last_activated(&self, prefix: &str) -> Result<Option<String>, Error> {
        let prefix = prefix.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result =
                    conn.query_row("SELECT version FROM activations WHERE prefix = ?1", params![prefix], |row| {
                        row.get::<_, String>(0)
                    });
                match result {
                    Ok(version) => Ok(Some(version)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}
