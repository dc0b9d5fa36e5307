// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Keepsake memory engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup. Empirically chosen constants (activation decay,
//! emotional bucket boundaries, affinity weights) live here as tunables
//! rather than hardened semantics.

use serde::{Deserialize, Serialize};

/// Top-level Keepsake configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KeepsakeConfig {
    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Short-term conversation window settings.
    #[serde(default)]
    pub stm: StmConfig,

    /// Optimistic-concurrency retry settings, shared by every versioned
    /// write (conversation window and relationship records).
    #[serde(default)]
    pub cas: CasConfig,

    /// Ingestion worker settings.
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Retrieval pipeline settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Graph spreading-activation settings.
    #[serde(default)]
    pub activation: ActivationConfig,

    /// Temporal decay and annotation settings.
    #[serde(default)]
    pub temporal: TemporalConfig,

    /// Relationship state engine settings.
    #[serde(default)]
    pub relationship: RelationshipConfig,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Dimensionality of the memory point collection. Points whose
    /// embedding length differs are never written.
    #[serde(default = "default_collection_dimension")]
    pub collection_dimension: usize,

    /// Enable WAL journal mode on open.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Per-operation store timeout in seconds.
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            collection_dimension: default_collection_dimension(),
            wal_mode: default_wal_mode(),
            timeout_secs: default_store_timeout_secs(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("keepsake").join("keepsake.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("keepsake.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_collection_dimension() -> usize {
    384
}

fn default_wal_mode() -> bool {
    true
}

fn default_store_timeout_secs() -> u64 {
    10
}

/// Short-term conversation window configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StmConfig {
    /// Maximum messages retained per conversation window.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

impl Default for StmConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
        }
    }
}

fn default_window_size() -> usize {
    15
}

/// Optimistic-concurrency retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CasConfig {
    /// Attempts per versioned write before giving up.
    #[serde(default = "default_cas_attempts")]
    pub attempts: u32,

    /// Lower bound of the jittered conflict backoff, in milliseconds.
    #[serde(default = "default_backoff_min_ms")]
    pub backoff_min_ms: u64,

    /// Upper bound of the jittered conflict backoff, in milliseconds.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for CasConfig {
    fn default() -> Self {
        Self {
            attempts: default_cas_attempts(),
            backoff_min_ms: default_backoff_min_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

fn default_cas_attempts() -> u32 {
    3
}

fn default_backoff_min_ms() -> u64 {
    20
}

fn default_backoff_max_ms() -> u64 {
    70
}

/// Ingestion worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngestionConfig {
    /// Messages shorter than this (in characters) are not ingested.
    #[serde(default = "default_min_message_len")]
    pub min_message_len: usize,

    /// Bounded capacity of the ingestion channel; enqueues beyond it are
    /// dropped with a warning rather than blocking the turn.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Timeout for one classifier call, in seconds.
    #[serde(default = "default_classify_timeout_secs")]
    pub classify_timeout_secs: u64,

    /// Timeout for one embedding call, in seconds.
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            min_message_len: default_min_message_len(),
            queue_capacity: default_queue_capacity(),
            classify_timeout_secs: default_classify_timeout_secs(),
            embed_timeout_secs: default_embed_timeout_secs(),
        }
    }
}

fn default_min_message_len() -> usize {
    5
}

fn default_queue_capacity() -> usize {
    256
}

fn default_classify_timeout_secs() -> u64 {
    15
}

fn default_embed_timeout_secs() -> u64 {
    15
}

/// Retrieval pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Memories selected into the working context per turn.
    #[serde(default = "default_prompt_budget")]
    pub prompt_budget: usize,

    /// Candidate limit for the primary vector search.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Candidates kept after reranking on the precise path.
    #[serde(default = "default_rerank_top_n")]
    pub rerank_top_n: usize,

    /// Items kept on the recent path. The scroll fetches three times
    /// this many to allow re-sorting.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    /// Timeout for one reranker call, in seconds.
    #[serde(default = "default_rerank_timeout_secs")]
    pub rerank_timeout_secs: u64,

    /// Timeout for one embedding call, in seconds.
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,

    /// Aggregate deadline for a whole turn's retrieval fan-out, in
    /// seconds. Anything still pending contributes nothing.
    #[serde(default = "default_turn_deadline_secs")]
    pub turn_deadline_secs: u64,

    /// Minimum similarity score for emotional supplementation hits.
    #[serde(default = "default_emotional_floor")]
    pub emotional_floor: f32,

    /// Valence at or above which a reading falls in the positive bucket.
    #[serde(default = "default_positive_valence")]
    pub positive_valence: f32,

    /// Valence at or below which a reading falls in the negative bucket.
    #[serde(default = "default_negative_valence")]
    pub negative_valence: f32,

    /// Arousal at or above which a reading falls in the high bucket.
    #[serde(default = "default_high_arousal")]
    pub high_arousal: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            prompt_budget: default_prompt_budget(),
            search_limit: default_search_limit(),
            rerank_top_n: default_rerank_top_n(),
            recent_limit: default_recent_limit(),
            rerank_timeout_secs: default_rerank_timeout_secs(),
            embed_timeout_secs: default_embed_timeout_secs(),
            turn_deadline_secs: default_turn_deadline_secs(),
            emotional_floor: default_emotional_floor(),
            positive_valence: default_positive_valence(),
            negative_valence: default_negative_valence(),
            high_arousal: default_high_arousal(),
        }
    }
}

fn default_prompt_budget() -> usize {
    3
}

fn default_search_limit() -> usize {
    15
}

fn default_rerank_top_n() -> usize {
    3
}

fn default_recent_limit() -> usize {
    3
}

fn default_rerank_timeout_secs() -> u64 {
    10
}

fn default_turn_deadline_secs() -> u64 {
    25
}

fn default_emotional_floor() -> f32 {
    0.25
}

fn default_positive_valence() -> f32 {
    0.3
}

fn default_negative_valence() -> f32 {
    -0.3
}

fn default_high_arousal() -> f32 {
    0.6
}

/// Graph spreading-activation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ActivationConfig {
    /// Maximum BFS depth from the seed set.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Top candidates used as activation seeds.
    #[serde(default = "default_max_seeds")]
    pub max_seeds: usize,

    /// Multiplicative activation decay per hop.
    #[serde(default = "default_hop_decay")]
    pub hop_decay: f32,

    /// Activation below which a node is neither kept nor expanded.
    #[serde(default = "default_activation_floor")]
    pub activation_floor: f32,

    /// Cosine similarity at or above which two points share an edge.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Edge weight assigned to a shared-trigger-keyword link when it
    /// exceeds the cosine similarity.
    #[serde(default = "default_trigger_weight")]
    pub trigger_weight: f32,

    /// Neighbour candidates fetched per expanded node.
    #[serde(default = "default_neighbor_limit")]
    pub neighbor_limit: usize,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_seeds: default_max_seeds(),
            hop_decay: default_hop_decay(),
            activation_floor: default_activation_floor(),
            similarity_threshold: default_similarity_threshold(),
            trigger_weight: default_trigger_weight(),
            neighbor_limit: default_neighbor_limit(),
        }
    }
}

fn default_max_depth() -> u32 {
    2
}

fn default_max_seeds() -> usize {
    2
}

fn default_hop_decay() -> f32 {
    0.7
}

fn default_activation_floor() -> f32 {
    0.4
}

fn default_similarity_threshold() -> f32 {
    0.65
}

fn default_trigger_weight() -> f32 {
    0.75
}

fn default_neighbor_limit() -> usize {
    5
}

/// Temporal decay and annotation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TemporalConfig {
    /// Hours for a memory's recall clarity to halve.
    #[serde(default = "default_half_life_hours")]
    pub half_life_hours: f32,

    /// Retention multiplier applied to the half-life of salient points.
    #[serde(default = "default_salient_multiplier")]
    pub salient_multiplier: f32,

    /// Importance at or above which a point counts as salient.
    #[serde(default = "default_salient_importance")]
    pub salient_importance: u8,

    /// Absolute valence at or above which a point counts as salient.
    #[serde(default = "default_salient_valence")]
    pub salient_valence: f32,

    /// Arousal at or above which a point counts as salient.
    #[serde(default = "default_salient_arousal")]
    pub salient_arousal: f32,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            half_life_hours: default_half_life_hours(),
            salient_multiplier: default_salient_multiplier(),
            salient_importance: default_salient_importance(),
            salient_valence: default_salient_valence(),
            salient_arousal: default_salient_arousal(),
        }
    }
}

fn default_half_life_hours() -> f32 {
    72.0
}

fn default_salient_multiplier() -> f32 {
    3.0
}

fn default_salient_importance() -> u8 {
    4
}

fn default_salient_valence() -> f32 {
    0.7
}

fn default_salient_arousal() -> f32 {
    0.8
}

/// Relationship state engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelationshipConfig {
    /// Starting intensity for every bounded dimension on first contact.
    #[serde(default = "default_dimension_seed")]
    pub dimension_seed: f32,

    /// Milestone ids retained per record.
    #[serde(default = "default_max_milestones")]
    pub max_milestones: usize,

    /// Shared experience ids retained per record.
    #[serde(default = "default_max_shared_experiences")]
    pub max_shared_experiences: usize,

    /// Interactions required for the friend stage.
    #[serde(default = "default_friend_interactions")]
    pub friend_interactions: u64,

    /// Interactions required for the close-friend stage.
    #[serde(default = "default_close_interactions")]
    pub close_interactions: u64,

    /// Interactions required for the confidant stage.
    #[serde(default = "default_confidant_interactions")]
    pub confidant_interactions: u64,

    /// Trust required for the friend stage.
    #[serde(default = "default_friend_trust")]
    pub friend_trust: f32,

    /// Trust required for the close-friend stage.
    #[serde(default = "default_close_trust")]
    pub close_trust: f32,

    /// Trust required for the confidant stage.
    #[serde(default = "default_confidant_trust")]
    pub confidant_trust: f32,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            dimension_seed: default_dimension_seed(),
            max_milestones: default_max_milestones(),
            max_shared_experiences: default_max_shared_experiences(),
            friend_interactions: default_friend_interactions(),
            close_interactions: default_close_interactions(),
            confidant_interactions: default_confidant_interactions(),
            friend_trust: default_friend_trust(),
            close_trust: default_close_trust(),
            confidant_trust: default_confidant_trust(),
        }
    }
}

fn default_dimension_seed() -> f32 {
    0.1
}

fn default_max_milestones() -> usize {
    3
}

fn default_max_shared_experiences() -> usize {
    5
}

fn default_friend_interactions() -> u64 {
    10
}

fn default_close_interactions() -> u64 {
    40
}

fn default_confidant_interactions() -> u64 {
    150
}

fn default_friend_trust() -> f32 {
    0.4
}

fn default_close_trust() -> f32 {
    0.6
}

fn default_confidant_trust() -> f32 {
    0.8
}
