// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Keepsake memory subsystem.
//!
//! Backs a conversational companion agent with:
//!
//! - a bounded, concurrently-updated short-term conversation window
//!   ([`ConversationWindow`]),
//! - a long-term retrieval pipeline blending vector similarity,
//!   reranking, emotional affinity, bounded spreading activation, and
//!   temporal decay ([`retrieval::RetrievalPipeline`]),
//! - an optimistic-concurrency relationship store
//!   ([`RelationshipEngine`]), and
//! - a decoupled ingestion worker ([`ingest`]).
//!
//! All of it hangs off one dependency-injected [`MemoryEngine`]. The
//! only synchronization primitive is per-key CAS at the store layer;
//! every external collaborator call is bounded by a timeout and degrades
//! to a documented fallback, so subsystem failure reduces context
//! quality rather than availability.

pub mod cas;
pub mod engine;
pub mod ingest;
pub mod relationship;
pub mod retrieval;
pub mod strategy;
pub mod window;

#[cfg(test)]
pub(crate) mod test_support;

pub use cas::{CasUpdater, RetryPolicy, UpdateOutcome, Versioned};
pub use engine::{MemoryEngine, TurnContext};
pub use ingest::IngestionHandle;
pub use relationship::{RelationshipDelta, RelationshipEngine};
pub use retrieval::{RetrievalPipeline, RetrievalQuery};
pub use strategy::{RetrievalStrategy, select_strategy};
pub use window::ConversationWindow;
