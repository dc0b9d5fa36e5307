// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relationship state engine.
//!
//! Versioned per-(subject, entity) records created lazily with
//! deterministic defaults, mutated through the CAS updater with a capped
//! deep-merge, and never deleted. Every bounded dimension is clamped to
//! [0, 1]; `shared_history` accumulates unclamped as an interaction
//! counter.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use keepsake_config::model::RelationshipConfig;
use keepsake_core::traits::kv::RELATIONSHIP_NAMESPACE;
use keepsake_core::types::{SHARED_HISTORY_DIMENSION, clamp_unit};
use keepsake_core::{RelationshipRecord, RelationshipStage, VersionedKvStore};
use tracing::warn;

use crate::cas::{CasUpdater, RetryPolicy, Versioned};

/// Dimension consulted for stage derivation.
const TRUST_DIMENSION: &str = "trust";

/// Bounded dimensions every fresh record starts with.
const SEED_DIMENSIONS: &[&str] = &["trust", "affection", "familiarity", "respect"];

impl Versioned for RelationshipRecord {
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// One analyzed interaction's worth of relationship change.
#[derive(Debug, Clone, Default)]
pub struct RelationshipDelta {
    /// Signed dimension adjustments, applied then clamped (except
    /// `shared_history`).
    pub dimensions: BTreeMap<String, f32>,
    /// Milestone memory id to record, if the interaction produced one.
    pub milestone: Option<String>,
    /// Shared experience memory id to record, if any.
    pub shared_experience: Option<String>,
}

/// Engine over the versioned relationship store.
pub struct RelationshipEngine {
    updater: CasUpdater,
    config: RelationshipConfig,
}

impl RelationshipEngine {
    pub fn new(
        kv: Arc<dyn VersionedKvStore>,
        policy: RetryPolicy,
        config: RelationshipConfig,
    ) -> Self {
        Self {
            updater: CasUpdater::new(kv, policy),
            config,
        }
    }

    fn key(subject_id: &str, entity_id: &str) -> String {
        format!("{subject_id}/{entity_id}")
    }

    /// The deterministic record synthesized on first contact.
    fn default_record(&self, subject_id: &str, entity_id: &str) -> RelationshipRecord {
        let mut dimensions = BTreeMap::new();
        for name in SEED_DIMENSIONS {
            dimensions.insert((*name).to_string(), self.config.dimension_seed);
        }
        dimensions.insert(SHARED_HISTORY_DIMENSION.to_string(), 0.0);
        RelationshipRecord {
            subject_id: subject_id.to_string(),
            entity_id: entity_id.to_string(),
            dimensions,
            stage: RelationshipStage::Stranger,
            milestones: Vec::new(),
            shared_experiences: Vec::new(),
            interaction_count: 0,
            last_interaction: None,
            version: 0,
        }
    }

    /// Current relationship snapshot, synthesizing defaults on first
    /// contact. A failed read degrades to the (unpersisted) default so
    /// the turn can proceed with a stale view.
    pub async fn snapshot(&self, subject_id: &str, entity_id: &str) -> RelationshipRecord {
        let key = Self::key(subject_id, entity_id);
        match self
            .updater
            .read_or_default(RELATIONSHIP_NAMESPACE, &key, || {
                self.default_record(subject_id, entity_id)
            })
            .await
        {
            Ok(record) => record,
            Err(e) => {
                warn!(subject_id, entity_id, error = %e, "relationship read failed; using defaults");
                self.default_record(subject_id, entity_id)
            }
        }
    }

    /// Apply one interaction's delta through the CAS loop.
    ///
    /// Returns the committed record, or `None` when retries exhausted
    /// and the update was not applied; callers must not assume success.
    pub async fn apply(
        &self,
        subject_id: &str,
        entity_id: &str,
        delta: RelationshipDelta,
    ) -> Option<RelationshipRecord> {
        let key = Self::key(subject_id, entity_id);
        let config = self.config.clone();
        self.updater
            .update(
                RELATIONSHIP_NAMESPACE,
                &key,
                || self.default_record(subject_id, entity_id),
                |record: &mut RelationshipRecord| {
                    merge_delta(record, &delta, &config);
                },
            )
            .await
            .applied()
    }
}

/// Capped deep-merge of one delta into a record.
fn merge_delta(
    record: &mut RelationshipRecord,
    delta: &RelationshipDelta,
    config: &RelationshipConfig,
) {
    for (name, adjustment) in &delta.dimensions {
        let entry = record.dimensions.entry(name.clone()).or_insert(0.0);
        *entry += adjustment;
        if name != SHARED_HISTORY_DIMENSION {
            *entry = clamp_unit(*entry);
        }
    }

    if let Some(milestone) = &delta.milestone {
        record.milestones.push(milestone.clone());
        cap_newest(&mut record.milestones, config.max_milestones);
    }
    if let Some(experience) = &delta.shared_experience {
        record.shared_experiences.push(experience.clone());
        cap_newest(&mut record.shared_experiences, config.max_shared_experiences);
    }

    record.interaction_count += 1;
    record.last_interaction = Some(Utc::now());
    record.stage = derive_stage(record, config);
}

/// Keep the most recent `cap` entries.
fn cap_newest(entries: &mut Vec<String>, cap: usize) {
    let overflow = entries.len().saturating_sub(cap);
    if overflow > 0 {
        entries.drain(..overflow);
    }
}

/// Deterministic stage derivation from interaction count and trust.
fn derive_stage(record: &RelationshipRecord, config: &RelationshipConfig) -> RelationshipStage {
    let trust = record
        .dimensions
        .get(TRUST_DIMENSION)
        .copied()
        .unwrap_or(0.0);
    let interactions = record.interaction_count;

    if interactions >= config.confidant_interactions && trust >= config.confidant_trust {
        RelationshipStage::Confidant
    } else if interactions >= config.close_interactions && trust >= config.close_trust {
        RelationshipStage::CloseFriend
    } else if interactions >= config.friend_interactions && trust >= config.friend_trust {
        RelationshipStage::Friend
    } else if interactions >= 1 {
        RelationshipStage::Acquaintance
    } else {
        RelationshipStage::Stranger
    }
}
