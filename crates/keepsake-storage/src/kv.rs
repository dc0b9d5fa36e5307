// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed versioned KV store.
//!
//! Each record carries an integer version token starting at 1; token 0
//! means "absent". Conditional writes run inside a single `conn.call`
//! closure, and because every write goes through the one background
//! writer thread, the version check and the write are atomic.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use keepsake_core::KeepsakeError;
use keepsake_core::traits::kv::{ABSENT_VERSION, VersionedKvStore};
use rusqlite::OptionalExtension;

use crate::database::{Database, map_tr_err};

/// Versioned record store backing the conversation window and the
/// relationship state engine.
pub struct SqliteKvStore {
    db: Arc<Database>,
}

impl SqliteKvStore {
    /// Creates a KV store over an open database.
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl VersionedKvStore for SqliteKvStore {
    async fn read(
        &self,
        ns: &str,
        key: &str,
    ) -> Result<(Option<serde_json::Value>, u64), KeepsakeError> {
        let ns = ns.to_string();
        let key = key.to_string();
        let row: Option<(String, i64)> = self
            .db
            .connection()
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT body, version FROM kv_records WHERE ns = ?1 AND key = ?2",
                        rusqlite::params![ns, key],
                        |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(map_tr_err)?;

        match row {
            Some((body, version)) => {
                let value = serde_json::from_str(&body).map_err(KeepsakeError::storage)?;
                Ok((Some(value), version as u64))
            }
            None => Ok((None, ABSENT_VERSION)),
        }
    }

    async fn write_if(
        &self,
        ns: &str,
        key: &str,
        body: serde_json::Value,
        expected: u64,
    ) -> Result<bool, KeepsakeError> {
        let ns = ns.to_string();
        let key = key.to_string();
        let body = body.to_string();
        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        self.db
            .connection()
            .call(move |conn| {
                let changed = if expected == ABSENT_VERSION {
                    // Creation race: a concurrent writer that gets there
                    // first leaves this insert a no-op.
                    conn.execute(
                        "INSERT INTO kv_records (ns, key, body, version, updated_at) \
                         VALUES (?1, ?2, ?3, 1, ?4) \
                         ON CONFLICT (ns, key) DO NOTHING",
                        rusqlite::params![ns, key, body, updated_at],
                    )?
                } else {
                    conn.execute(
                        "UPDATE kv_records \
                         SET body = ?3, version = version + 1, updated_at = ?4 \
                         WHERE ns = ?1 AND key = ?2 AND version = ?5",
                        rusqlite::params![ns, key, body, updated_at, expected as i64],
                    )?
                };
                Ok(changed == 1)
            })
            .await
            .map_err(map_tr_err)
    }
}
