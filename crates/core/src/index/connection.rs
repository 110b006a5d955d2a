//! SQLite connection management with pragma configuration.
//!
//! This module handles opening the index database, applying required pragmas
//! for performance and concurrency (WAL mode), and running migrations.

use std::path::Path;

use tokio_rusqlite::Connection;

use crate::Error;

use super::migrations;

/// SQLite-backed index store handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations on a
/// background thread. Cloning is cheap and clones share the connection.
#[derive(Clone, Debug)]
pub struct SqliteIndex {
    pub(crate) conn: Connection,
}

impl SqliteIndex {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| Error::Index(e.into()))?;
        Self::init(conn).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Index(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;
                 PRAGMA temp_store=MEMORY;",
            )?;
            Ok(())
        })
        .await
        .map_err(Error::Index)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}
