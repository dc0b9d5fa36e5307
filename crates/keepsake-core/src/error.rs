// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Keepsake memory engine.

use thiserror::Error;

/// The primary error type used across Keepsake store and collaborator traits.
///
/// Only two failures surface to turn processing: a failed query embedding
/// (the caller decides whether to proceed memory-less) and CAS-retry
/// exhaustion on a versioned write. Everything else is absorbed at its
/// origin with a documented fallback.
#[derive(Debug, Error)]
pub enum KeepsakeError {
    /// Configuration errors (invalid TOML, missing required fields, out-of-range values).
    #[error("configuration error: {0}")]
    Config(String),

    /// KV or vector store read/write failure. Writes are retried at the
    /// CAS layer; failed reads degrade to the caller's documented fallback.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// External classifier failed or timed out. Ingestion degrades to a
    /// default low-importance classification, never fatal.
    #[error("classification error: {message}")]
    Classification {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Embedding collaborator failure. Fatal for the initial retrieval
    /// query embedding; a per-point drop during ingestion.
    #[error("embedding error: {message}")]
    Embedding {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An embedding's dimensionality does not match the collection's.
    /// Hard per-point failure: the point is dropped, never written.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An isolated retrieval stage failed and contributed nothing.
    #[error("retrieval stage `{stage}` failed: {message}")]
    RetrievalStage {
        stage: &'static str,
        message: String,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl KeepsakeError {
    /// Wrap an arbitrary error as a storage failure.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        KeepsakeError::Storage {
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_render_messages() {
        let dim = KeepsakeError::DimensionMismatch {
            expected: 384,
            actual: 768,
        };
        assert_eq!(
            dim.to_string(),
            "embedding dimension mismatch: expected 384, got 768"
        );

        let stage = KeepsakeError::RetrievalStage {
            stage: "rerank",
            message: "upstream 503".into(),
        };
        assert!(stage.to_string().contains("rerank"));

        let storage = KeepsakeError::storage(std::io::Error::other("disk gone"));
        assert!(storage.to_string().contains("disk gone"));
    }
}
