// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the memory engine and its collaborators.
//!
//! Every external dependency (embedding, classification, reranking, the
//! two stores) sits behind an `#[async_trait]` trait so the engine can be
//! constructed from injected service objects and tested against mocks.

pub mod classifier;
pub mod embedding;
pub mod kv;
pub mod point_store;
pub mod reranker;

pub use classifier::ClassifierAdapter;
pub use embedding::EmbeddingAdapter;
pub use kv::{ABSENT_VERSION, RELATIONSHIP_NAMESPACE, STM_NAMESPACE, VersionedKvStore};
pub use point_store::PointStore;
pub use reranker::RerankAdapter;
