// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: interval ordering, unit-range bounds, and non-zero sizes.

use crate::diagnostic::ConfigError;
use crate::model::KeepsakeConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)`
/// with all collected validation errors (does not fail fast).
pub fn validate_config(config: &KeepsakeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(validation("storage.database_path must not be empty"));
    }
    if config.storage.collection_dimension == 0 {
        errors.push(validation("storage.collection_dimension must be at least 1"));
    }

    if config.stm.window_size == 0 {
        errors.push(validation("stm.window_size must be at least 1"));
    }

    if config.cas.attempts == 0 {
        errors.push(validation("cas.attempts must be at least 1"));
    }
    if config.cas.backoff_min_ms > config.cas.backoff_max_ms {
        errors.push(validation(&format!(
            "cas.backoff_min_ms ({}) must not exceed cas.backoff_max_ms ({})",
            config.cas.backoff_min_ms, config.cas.backoff_max_ms
        )));
    }

    if config.retrieval.prompt_budget == 0 {
        errors.push(validation("retrieval.prompt_budget must be at least 1"));
    }
    if config.retrieval.negative_valence >= config.retrieval.positive_valence {
        errors.push(validation(&format!(
            "retrieval.negative_valence ({}) must be below retrieval.positive_valence ({})",
            config.retrieval.negative_valence, config.retrieval.positive_valence
        )));
    }
    if !(0.0..=1.0).contains(&config.retrieval.high_arousal) {
        errors.push(validation("retrieval.high_arousal must be in [0, 1]"));
    }

    if config.activation.hop_decay <= 0.0 || config.activation.hop_decay > 1.0 {
        errors.push(validation("activation.hop_decay must be in (0, 1]"));
    }
    if !(0.0..=1.0).contains(&config.activation.activation_floor) {
        errors.push(validation("activation.activation_floor must be in [0, 1]"));
    }
    if !(0.0..=1.0).contains(&config.activation.similarity_threshold) {
        errors.push(validation("activation.similarity_threshold must be in [0, 1]"));
    }

    if config.temporal.half_life_hours <= 0.0 {
        errors.push(validation("temporal.half_life_hours must be positive"));
    }
    if config.temporal.salient_multiplier < 1.0 {
        errors.push(validation("temporal.salient_multiplier must be at least 1"));
    }

    if !(0.0..=1.0).contains(&config.relationship.dimension_seed) {
        errors.push(validation("relationship.dimension_seed must be in [0, 1]"));
    }
    if config.relationship.friend_interactions > config.relationship.close_interactions
        || config.relationship.close_interactions > config.relationship.confidant_interactions
    {
        errors.push(validation(
            "relationship stage interaction thresholds must be non-decreasing",
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn validation(message: &str) -> ConfigError {
    ConfigError::Validation {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeepsakeConfig;

    #[test]
    fn default_config_validates() {
        let config = KeepsakeConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn inverted_backoff_window_is_rejected() {
        let mut config = KeepsakeConfig::default();
        config.cas.backoff_min_ms = 100;
        config.cas.backoff_max_ms = 20;
        let errors = validate_config(&config).expect_err("should reject");
        assert!(errors.iter().any(|e| e.to_string().contains("backoff_min_ms")));
    }

    #[test]
    fn all_errors_are_collected_not_just_the_first() {
        let mut config = KeepsakeConfig::default();
        config.stm.window_size = 0;
        config.retrieval.prompt_budget = 0;
        config.activation.hop_decay = 0.0;
        let errors = validate_config(&config).expect_err("should reject");
        assert!(errors.len() >= 3, "expected 3+ errors, got {}", errors.len());
    }

    #[test]
    fn zero_collection_dimension_is_rejected() {
        let mut config = KeepsakeConfig::default();
        config.storage.collection_dimension = 0;
        assert!(validate_config(&config).is_err());
    }
}
