// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and
//! migrations on open.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread: the `Database` struct IS the single writer, which is what
//! makes the KV store's check-and-set closures atomic. Do NOT create
//! additional Connection instances for writes.

use std::path::Path;

use keepsake_core::KeepsakeError;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations;

/// Map a tokio-rusqlite error into the storage error variant.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> KeepsakeError {
    KeepsakeError::Storage {
        source: Box::new(e),
    }
}

/// A single migrated SQLite connection shared by all stores.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path`, apply PRAGMAs,
    /// and run pending migrations.
    pub async fn open(path: &Path, wal_mode: bool) -> Result<Self, KeepsakeError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(KeepsakeError::storage)?;
        }
        let conn = Connection::open(path)
            .await
            .map_err(KeepsakeError::storage)?;
        debug!(path = %path.display(), "opened keepsake database");
        Self::init(conn, wal_mode).await
    }

    /// Open an in-memory database. Used by tests and ephemeral deployments.
    pub async fn open_in_memory() -> Result<Self, KeepsakeError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(KeepsakeError::storage)?;
        Self::init(conn, false).await
    }

    async fn init(conn: Connection, wal_mode: bool) -> Result<Self, KeepsakeError> {
        conn.call(move |conn| {
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            migrations::run_migrations(conn)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
