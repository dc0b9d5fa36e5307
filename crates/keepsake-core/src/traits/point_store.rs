// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector store abstraction over insert-only memory points.

use async_trait::async_trait;

use crate::error::KeepsakeError;
use crate::types::{MemoryPoint, ScoredPoint, SearchRequest};

/// The long-term memory collection: insert-only points with filtered
/// similarity search and a recency range-scan.
///
/// Points are never updated in place, so there are no write-write
/// conflicts at this layer; id uniqueness comes from fresh v4 ids.
#[async_trait]
pub trait PointStore: Send + Sync {
    /// Writes a batch of points.
    ///
    /// Implementations must refuse a batch containing any point whose
    /// vector length differs from the collection dimensionality, writing
    /// none of it.
    async fn upsert(&self, points: Vec<MemoryPoint>) -> Result<(), KeepsakeError>;

    /// Filtered similarity search, best matches first.
    async fn search(&self, request: SearchRequest) -> Result<Vec<ScoredPoint>, KeepsakeError>;

    /// Recency range-scan for one context: newest points first, unscored.
    async fn scroll(&self, context: &str, limit: usize)
    -> Result<Vec<MemoryPoint>, KeepsakeError>;
}
