// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Emotional-affinity scoring and bucket boundaries.
//!
//! Affinity blends three terms: cosine over named emotion dimensions,
//! valence distance, and arousal distance. The resulting match rescales
//! an existing ranking score by at most ±20%, so emotional pull can
//! nudge but never invert a ranking outright.

use std::collections::BTreeMap;

use keepsake_config::model::RetrievalConfig;
use keepsake_core::types::{EmotionalState, PointPayload};

/// Weight of the dimension-cosine term.
const DIMENSIONS_WEIGHT: f32 = 0.4;
/// Weight of the valence-distance term.
const VALENCE_WEIGHT: f32 = 0.4;
/// Weight of the arousal-distance term.
const AROUSAL_WEIGHT: f32 = 0.2;
/// Full swing of the rescale factor around 1.0 (±20%).
const RESCALE_SPAN: f32 = 0.4;

/// Cosine similarity over sparse named dimensions.
///
/// Keys missing from either map contribute only to that side's norm.
/// Empty maps yield 0.0.
pub fn dimension_cosine(a: &BTreeMap<String, f32>, b: &BTreeMap<String, f32>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    for (key, va) in a {
        norm_a += va * va;
        if let Some(vb) = b.get(key) {
            dot += va * vb;
        }
    }
    let norm_b: f32 = b.values().map(|v| v * v).sum();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Emotional-affinity match between the current read and a candidate,
/// in [0, 1].
///
/// When either side carries no named dimensions, that term's weight is
/// redistributed onto the valence and arousal terms (2:1) instead of
/// flooring dimensionless candidates at the zero-cosine mark.
pub fn affinity(query: &EmotionalState, candidate: &PointPayload) -> f32 {
    let valence_term = 1.0 - (query.valence - candidate.valence).abs() / 2.0;
    let arousal_term = 1.0 - (query.arousal - candidate.arousal).abs();

    if query.dimensions.is_empty() || candidate.dimensions.is_empty() {
        valence_term * (2.0 / 3.0) + arousal_term * (1.0 / 3.0)
    } else {
        DIMENSIONS_WEIGHT * dimension_cosine(&query.dimensions, &candidate.dimensions)
            + VALENCE_WEIGHT * valence_term
            + AROUSAL_WEIGHT * arousal_term
    }
}

/// Score multiplier for a given affinity match, bounded to [0.8, 1.2].
pub fn rescale_factor(match_score: f32) -> f32 {
    1.0 + (match_score.clamp(0.0, 1.0) - 0.5) * RESCALE_SPAN
}

/// Valence bucket (as an inclusive range) for a reading, per the
/// configured boundaries.
pub fn valence_range(valence: f32, config: &RetrievalConfig) -> (f32, f32) {
    if valence >= config.positive_valence {
        (config.positive_valence, 1.0)
    } else if valence <= config.negative_valence {
        (-1.0, config.negative_valence)
    } else {
        (config.negative_valence, config.positive_valence)
    }
}

/// Arousal bucket (as an inclusive range) for a reading.
pub fn arousal_range(arousal: f32, config: &RetrievalConfig) -> (f32, f32) {
    if arousal >= config.high_arousal {
        (config.high_arousal, 1.0)
    } else {
        (0.0, config.high_arousal)
    }
}
