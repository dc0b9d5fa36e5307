// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The long-term memory retrieval pipeline.
//!
//! Orchestrates vector search, reranking, emotional-affinity rescaling,
//! graph spreading activation, supplementation, merge/dedup/sort, and
//! temporal annotation into one ranked working context per turn.

pub mod activation;
pub mod emotional;
pub mod pipeline;
pub mod temporal;

pub use pipeline::{RetrievalPipeline, RetrievalQuery};

use keepsake_core::types::PointPayload;
use keepsake_core::{MemorySource, RetrievedMemory, ScoreKind};
use uuid::Uuid;

/// A candidate flowing through the pipeline stages.
///
/// Carries its vector so downstream stages (spreading activation) can
/// expand from it without re-fetching.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
    pub score: ScoreKind,
    pub source: MemorySource,
}

impl Candidate {
    pub(crate) fn into_memory(self) -> RetrievedMemory {
        RetrievedMemory {
            id: self.id,
            payload: self.payload,
            score: self.score,
            source: self.source,
            temporal_context: None,
            decay_factor: 1.0,
        }
    }
}
