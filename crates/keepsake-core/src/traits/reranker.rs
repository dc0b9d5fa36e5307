// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reranker adapter trait for multi-criterion candidate reordering.

use async_trait::async_trait;

use crate::error::KeepsakeError;
use crate::types::RerankResult;

/// Adapter for the external reranking collaborator.
///
/// Scores candidate documents against a query text. Best-effort in the
/// retrieval pipeline: on failure or an empty result the original
/// similarity order is kept.
#[async_trait]
pub trait RerankAdapter: Send + Sync {
    /// Reranks `documents` against `query`.
    ///
    /// Results reference candidates by their position in `documents`;
    /// implementations may omit candidates they could not score.
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
    ) -> Result<Vec<RerankResult>, KeepsakeError>;
}
