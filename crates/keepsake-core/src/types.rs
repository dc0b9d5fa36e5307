// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Keepsake workspace.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Name of the one relationship dimension that accumulates without
/// clamping: it counts shared interactions rather than expressing a
/// bounded intensity.
pub const SHARED_HISTORY_DIMENSION: &str = "shared_history";

/// A single conversational message flowing through the system.
///
/// Created once per inbound turn; feeds the conversation window
/// synchronously and the ingestion worker asynchronously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Id of the user who sent the message.
    pub user_id: String,
    /// Conversation/context id the message belongs to.
    pub context_id: String,
    /// Raw message text.
    pub text: String,
    /// Platform-assigned message id, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Arrival timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Classified type of a stored memory point.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Something that happened in a conversation.
    Episode,
    /// A standalone fact about the user or the world.
    Fact,
    /// A stated like, dislike, or habit.
    Preference,
    /// An emotionally charged moment.
    Emotion,
    /// A conclusion the agent drew itself.
    Insight,
    /// Classifier unavailable; stored with minimum importance.
    Unknown,
}

/// Snapshot of an emotional read: overall valence/arousal plus named
/// per-dimension intensities (e.g. "joy", "trust").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalState {
    /// Pleasantness, in [-1, 1].
    pub valence: f32,
    /// Intensity, in [0, 1].
    pub arousal: f32,
    /// Named dimension intensities, each in [0, 1].
    #[serde(default)]
    pub dimensions: BTreeMap<String, f32>,
}

impl EmotionalState {
    /// A flat, neutral state.
    pub fn neutral() -> Self {
        Self {
            valence: 0.0,
            arousal: 0.0,
            dimensions: BTreeMap::new(),
        }
    }
}

impl Default for EmotionalState {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Output of the external message classifier.
#[derive(Debug, Clone, Deserialize)]
pub struct Classification {
    /// Classified memory type.
    pub kind: MemoryKind,
    /// Importance score, 1-5.
    pub importance: u8,
    /// Condensed text to embed and store.
    pub condensed: String,
    /// Emotional valence of the message, [-1, 1].
    pub valence: f32,
    /// Emotional arousal of the message, [0, 1].
    pub arousal: f32,
    /// Named emotional dimension intensities, each [0, 1].
    #[serde(default)]
    pub dimensions: BTreeMap<String, f32>,
    /// Associative trigger keywords for graph activation.
    #[serde(default)]
    pub triggers: Vec<String>,
}

impl Classification {
    /// The degraded classification used when the external classifier
    /// fails or times out: the raw text is kept at minimum importance
    /// rather than silently dropped.
    pub fn unknown(text: &str) -> Self {
        Self {
            kind: MemoryKind::Unknown,
            importance: 1,
            condensed: text.to_string(),
            valence: 0.0,
            arousal: 0.0,
            dimensions: BTreeMap::new(),
            triggers: Vec::new(),
        }
    }
}

/// Payload carried by every memory point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    /// Classified memory type.
    pub kind: MemoryKind,
    /// When the remembered moment occurred.
    pub timestamp: DateTime<Utc>,
    /// User the memory came from.
    pub source_user: String,
    /// Conversation/context the memory came from.
    pub source_context: String,
    /// Condensed text content.
    pub text_content: String,
    /// Importance score, 1-5.
    pub importance: u8,
    /// Emotional valence, [-1, 1].
    pub valence: f32,
    /// Emotional arousal, [0, 1].
    pub arousal: f32,
    /// Named emotional dimension intensities, each [0, 1].
    #[serde(default)]
    pub dimensions: BTreeMap<String, f32>,
    /// Associative trigger keywords.
    #[serde(default)]
    pub triggers: Vec<String>,
}

/// An insert-only vector store point: embedding plus payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPoint {
    /// Globally unique point id, a fresh v4 per write.
    pub id: Uuid,
    /// Embedding vector; length must equal the collection dimensionality.
    pub vector: Vec<f32>,
    /// Stored payload.
    pub payload: PointPayload,
}

/// A point returned from similarity search, with its score.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
    /// Cosine similarity against the query vector.
    pub score: f32,
}

/// Payload-level filter for point searches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointFilter {
    /// Restrict to a single conversation/context.
    pub context: Option<String>,
    /// Inclusive valence range.
    pub valence: Option<(f32, f32)>,
    /// Inclusive arousal range.
    pub arousal: Option<(f32, f32)>,
}

impl PointFilter {
    /// Filter restricted to one context.
    pub fn for_context(context: &str) -> Self {
        Self {
            context: Some(context.to_string()),
            ..Self::default()
        }
    }
}

/// A similarity search request against the point store.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// Query vector.
    pub vector: Vec<f32>,
    /// Maximum number of results.
    pub limit: usize,
    /// Payload filter.
    pub filter: PointFilter,
    /// Ids to exclude from the result set.
    pub exclude: Vec<Uuid>,
    /// Minimum similarity score; results below it are dropped.
    pub min_score: Option<f32>,
}

/// Which retrieval stage produced a memory item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    /// Primary vector search (or generic supplementation).
    Retrieved,
    /// Recency scroll of the current context.
    Recent,
    /// Emotional-bucket supplementation search.
    Emotional,
    /// Graph spreading activation.
    Activated,
}

/// Tagged score carried by a retrieved memory.
///
/// The merge step sorts purely on [`ScoreKind::priority`], so the old
/// null-coalescing precedence (rerank, then activation, then similarity)
/// is expressed by which tag a stage assigns, not by branching at sort
/// time. Unscored items sort last and fall back to the timestamp
/// tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ScoreKind {
    /// Score from the external reranker.
    Rerank(f32),
    /// Spreading-activation score.
    Activation(f32),
    /// Raw vector similarity (or recency prior for scrolled points).
    Similarity(f32),
    /// No ranking signal available.
    Unscored,
}

impl ScoreKind {
    /// The single resolved priority value used for merge ordering.
    pub fn priority(&self) -> f32 {
        match self {
            ScoreKind::Rerank(v) | ScoreKind::Activation(v) | ScoreKind::Similarity(v) => *v,
            ScoreKind::Unscored => f32::NEG_INFINITY,
        }
    }

    /// Rescale the carried value, preserving the tag.
    pub fn scaled(self, factor: f32) -> Self {
        match self {
            ScoreKind::Rerank(v) => ScoreKind::Rerank(v * factor),
            ScoreKind::Activation(v) => ScoreKind::Activation(v * factor),
            ScoreKind::Similarity(v) => ScoreKind::Similarity(v * factor),
            ScoreKind::Unscored => ScoreKind::Unscored,
        }
    }
}

/// A memory item selected into the working context for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedMemory {
    pub id: Uuid,
    pub payload: PointPayload,
    /// Ranking signal that selected this item.
    pub score: ScoreKind,
    /// Stage that produced this item.
    pub source: MemorySource,
    /// Human-relative recall phrase, e.g. "3 days ago".
    pub temporal_context: Option<String>,
    /// How clearly the memory is recalled, [0, 1].
    pub decay_factor: f32,
}

/// Relationship stage between the agent and an entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStage {
    Stranger,
    Acquaintance,
    Friend,
    CloseFriend,
    Confidant,
}

/// Versioned relationship state between a subject and an entity.
///
/// Records are created lazily with deterministic defaults on first
/// contact, mutated on every analyzed interaction, and never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    /// The relationship holder (the agent persona, usually).
    pub subject_id: String,
    /// The other party.
    pub entity_id: String,
    /// Dimension intensities, each clamped to [0, 1] except
    /// [`SHARED_HISTORY_DIMENSION`], which accumulates unbounded.
    pub dimensions: BTreeMap<String, f32>,
    /// Derived relationship stage.
    pub stage: RelationshipStage,
    /// Most recent milestone memory ids (capped).
    pub milestones: Vec<String>,
    /// Most recent shared experience memory ids (capped).
    pub shared_experiences: Vec<String>,
    /// Total analyzed interactions.
    pub interaction_count: u64,
    /// Timestamp of the last analyzed interaction.
    pub last_interaction: Option<DateTime<Utc>>,
    /// Strictly increasing per successful write; mirrors the store's
    /// version token.
    pub version: u64,
}

/// Input for an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingInput {
    pub texts: Vec<String>,
}

/// Output from an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    pub embeddings: Vec<Vec<f32>>,
    pub dimensions: usize,
}

/// One reranker verdict: the candidate's position in the input slice
/// and its relevance score against the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankResult {
    pub index: usize,
    pub score: f32,
}

/// Clamp to the unit interval [0, 1].
pub fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Clamp to the signed unit interval [-1, 1].
pub fn clamp_signed_unit(value: f32) -> f32 {
    value.clamp(-1.0, 1.0)
}

/// Convert an f32 vector to little-endian bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert a stored BLOB back to an f32 vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or zero-norm inputs; embeddings
/// from collaborators are not assumed normalized.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
