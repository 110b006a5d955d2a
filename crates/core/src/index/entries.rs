//! Index entry operations on the SQLite backend.
//!
//! Entries map a prefixed request key to the stored path of a computed
//! variant. A changed transform recipe yields a different key, so entries
//! are never rewritten with new meaning; the upsert only matters when
//! concurrent misses for the same key race, where the last writer wins.

use async_trait::async_trait;
use tokio_rusqlite::{params, rusqlite};

use crate::Error;

use super::connection::SqliteIndex;
use super::store::IndexStore;

#[async_trait]
impl IndexStore for SqliteIndex {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT stored_path FROM index_entries WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                );

                match result {
                    Ok(path) => Ok(Some(path)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO index_entries (key, stored_path, created_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                         stored_path = excluded.stored_path,
                         created_at = excluded.created_at",
                    params![key, value, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

impl SqliteIndex {
    /// Number of index entries.
    pub async fn count(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM index_entries", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries older than the given number of days.
    ///
    /// Returns the number of deleted entries. The referenced objects stay in
    /// destination storage; a later request recomputes and re-records them.
    pub async fn purge_older_than(&self, days: i64) -> Result<u64, Error> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(days)).to_rfc3339();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM index_entries WHERE created_at < ?1",
                    params![cutoff],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries whose key starts with the given prefix.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_key_prefix(&self, prefix: &str) -> Result<u64, Error> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM index_entries WHERE key LIKE ?1 ESCAPE '\\'",
                    params![pattern],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
