// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::KeepsakeError;
use crate::types::{EmbeddingInput, EmbeddingOutput};

/// Adapter for generating vector embeddings from text.
///
/// Powers both ingestion (embedding condensed memories) and retrieval
/// (embedding the query). Implementations carry their own transport;
/// the engine only depends on the input/output contract.
#[async_trait]
pub trait EmbeddingAdapter: Send + Sync {
    /// Generates embeddings for the given input.
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, KeepsakeError>;
}
