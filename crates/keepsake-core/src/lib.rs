// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Keepsake memory engine.
//!
//! This crate provides the foundational trait definitions, error types,
//! and domain types used throughout the Keepsake workspace: the memory
//! point model, the versioned KV contract, and the collaborator seams
//! (embedding, classification, reranking).

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::KeepsakeError;
pub use types::{
    Classification, EmotionalState, MemoryKind, MemoryPoint, MemorySource, Message, PointFilter,
    PointPayload, RelationshipRecord, RelationshipStage, RetrievedMemory, ScoreKind, ScoredPoint,
    SearchRequest,
};

// Re-export all adapter traits at crate root.
pub use traits::{
    ClassifierAdapter, EmbeddingAdapter, PointStore, RerankAdapter, VersionedKvStore,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_trait_modules_are_exported() {
        // Compile-time check that every seam is reachable through the
        // public API.
        fn _assert_embedding<T: EmbeddingAdapter>() {}
        fn _assert_classifier<T: ClassifierAdapter>() {}
        fn _assert_reranker<T: RerankAdapter>() {}
        fn _assert_point_store<T: PointStore>() {}
        fn _assert_kv<T: VersionedKvStore>() {}
    }

    #[test]
    fn error_variants_cover_the_taxonomy() {
        let _config = KeepsakeError::Config("bad".into());
        let _storage = KeepsakeError::storage(std::io::Error::other("io"));
        let _classification = KeepsakeError::Classification {
            message: "timed out".into(),
            source: None,
        };
        let _embedding = KeepsakeError::Embedding {
            message: "api down".into(),
            source: None,
        };
        let _mismatch = KeepsakeError::DimensionMismatch {
            expected: 384,
            actual: 512,
        };
        let _stage = KeepsakeError::RetrievalStage {
            stage: "activation",
            message: "store offline".into(),
        };
        let _timeout = KeepsakeError::Timeout {
            duration: std::time::Duration::from_secs(10),
        };
        let _internal = KeepsakeError::Internal("unexpected".into());
    }
}
