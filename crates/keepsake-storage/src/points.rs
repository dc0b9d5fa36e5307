// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed memory point store.
//!
//! Vectors are stored as little-endian f32 BLOBs and scored in-process
//! with cosine similarity; payload maps and arrays are stored as JSON
//! text columns. The collection is insert-only, so the only write-time
//! invariant is the dimensionality check.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use keepsake_core::types::{blob_to_vec, cosine_similarity, vec_to_blob};
use keepsake_core::{
    KeepsakeError, MemoryKind, MemoryPoint, PointPayload, PointStore, ScoredPoint, SearchRequest,
};
use uuid::Uuid;

use crate::database::{Database, map_tr_err};

const POINT_COLUMNS: &str = "id, vector, kind, timestamp, source_user, source_context, \
     text_content, importance, valence, arousal, dimensions, triggers";

/// Persistent vector collection for memory points.
pub struct SqlitePointStore {
    db: Arc<Database>,
    dimension: usize,
}

impl SqlitePointStore {
    /// Creates a point store over an open database.
    ///
    /// `dimension` is the collection dimensionality; points with any
    /// other vector length are refused.
    pub fn new(db: Arc<Database>, dimension: usize) -> Self {
        Self { db, dimension }
    }

    /// The configured collection dimensionality.
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl PointStore for SqlitePointStore {
    async fn upsert(&self, points: Vec<MemoryPoint>) -> Result<(), KeepsakeError> {
        // The whole batch is checked before the first insert: a point
        // with mismatched dimensionality must never be persisted.
        for point in &points {
            if point.vector.len() != self.dimension {
                return Err(KeepsakeError::DimensionMismatch {
                    expected: self.dimension,
                    actual: point.vector.len(),
                });
            }
        }

        let rows = points
            .into_iter()
            .map(point_to_row)
            .collect::<Result<Vec<_>, _>>()?;

        self.db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR REPLACE INTO memory_points \
                         (id, vector, kind, timestamp, source_user, source_context, \
                          text_content, importance, valence, arousal, dimensions, triggers) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    )?;
                    for row in rows {
                        stmt.execute(rusqlite::params![
                            row.0, row.1, row.2, row.3, row.4, row.5, row.6, row.7, row.8,
                            row.9, row.10, row.11,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<ScoredPoint>, KeepsakeError> {
        let mut sql = format!("SELECT {POINT_COLUMNS} FROM memory_points");
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<rusqlite::types::Value> = Vec::new();

        if let Some(context) = &request.filter.context {
            clauses.push("source_context = ?");
            params.push(context.clone().into());
        }
        if let Some((lo, hi)) = request.filter.valence {
            clauses.push("valence BETWEEN ? AND ?");
            params.push((lo as f64).into());
            params.push((hi as f64).into());
        }
        if let Some((lo, hi)) = request.filter.arousal {
            clauses.push("arousal BETWEEN ? AND ?");
            params.push((lo as f64).into());
            params.push((hi as f64).into());
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let candidates = self
            .db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let points = stmt
                    .query_map(rusqlite::params_from_iter(params), row_to_point)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(points)
            })
            .await
            .map_err(map_tr_err)?;

        let exclude: HashSet<Uuid> = request.exclude.iter().copied().collect();
        let mut scored: Vec<ScoredPoint> = candidates
            .into_iter()
            .filter(|p| !exclude.contains(&p.id))
            .filter_map(|p| {
                if p.vector.len() != request.vector.len() {
                    return None;
                }
                let score = cosine_similarity(&request.vector, &p.vector);
                if let Some(floor) = request.min_score
                    && score < floor
                {
                    return None;
                }
                Some(ScoredPoint {
                    id: p.id,
                    vector: p.vector,
                    payload: p.payload,
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(request.limit);
        Ok(scored)
    }

    async fn scroll(
        &self,
        context: &str,
        limit: usize,
    ) -> Result<Vec<MemoryPoint>, KeepsakeError> {
        let context = context.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {POINT_COLUMNS} FROM memory_points \
                     WHERE source_context = ?1 ORDER BY timestamp DESC LIMIT ?2"
                ))?;
                let points = stmt
                    .query_map(rusqlite::params![context, limit as i64], row_to_point)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(points)
            })
            .await
            .map_err(map_tr_err)
    }
}

type PointRow = (
    String,
    Vec<u8>,
    String,
    String,
    String,
    String,
    String,
    i64,
    f64,
    f64,
    String,
    String,
);

fn point_to_row(point: MemoryPoint) -> Result<PointRow, KeepsakeError> {
    let p = point.payload;
    let dimensions = serde_json::to_string(&p.dimensions)
        .map_err(|e| KeepsakeError::Internal(format!("dimensions not serializable: {e}")))?;
    let triggers = serde_json::to_string(&p.triggers)
        .map_err(|e| KeepsakeError::Internal(format!("triggers not serializable: {e}")))?;
    Ok((
        point.id.to_string(),
        vec_to_blob(&point.vector),
        p.kind.to_string(),
        p.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        p.source_user,
        p.source_context,
        p.text_content,
        i64::from(p.importance),
        f64::from(p.valence),
        f64::from(p.arousal),
        dimensions,
        triggers,
    ))
}

fn row_to_point(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryPoint> {
    let id_str: String = row.get(0)?;
    let blob: Vec<u8> = row.get(1)?;
    let kind_str: String = row.get(2)?;
    let ts_str: String = row.get(3)?;
    let source_user: String = row.get(4)?;
    let source_context: String = row.get(5)?;
    let text_content: String = row.get(6)?;
    let importance: i64 = row.get(7)?;
    let valence: f64 = row.get(8)?;
    let arousal: f64 = row.get(9)?;
    let dimensions_str: String = row.get(10)?;
    let triggers_str: String = row.get(11)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| conversion_err(0, e))?;
    let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map_err(|e| conversion_err(3, e))?
        .with_timezone(&Utc);
    let dimensions: BTreeMap<String, f32> =
        serde_json::from_str(&dimensions_str).map_err(|e| conversion_err(10, e))?;
    let triggers: Vec<String> =
        serde_json::from_str(&triggers_str).map_err(|e| conversion_err(11, e))?;
    // Unrecognized kinds read as Unknown rather than failing the scan.
    let kind = kind_str.parse().unwrap_or(MemoryKind::Unknown);

    Ok(MemoryPoint {
        id,
        vector: blob_to_vec(&blob),
        payload: PointPayload {
            kind,
            timestamp,
            source_user,
            source_context,
            text_content,
            importance: importance.clamp(1, 5) as u8,
            valence: valence as f32,
            arousal: arousal as f32,
            dimensions,
            triggers,
        },
    })
}

fn conversion_err<E>(column: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}
