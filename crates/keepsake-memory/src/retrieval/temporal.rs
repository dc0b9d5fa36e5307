// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temporal annotation: human-relative recall phrases and decay factors.
//!
//! Decay follows an exponential half-life. Salient memories (high
//! importance or strong emotion) decay against a lengthened half-life,
//! so a birthday confession stays recallable long after small talk
//! has faded.

use chrono::{DateTime, Duration, Utc};
use keepsake_config::model::TemporalConfig;
use keepsake_core::RetrievedMemory;
use keepsake_core::types::PointPayload;

/// Human-relative phrase for an elapsed duration.
pub fn describe_elapsed(elapsed: Duration) -> String {
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return plural(minutes, "minute");
    }
    let hours = elapsed.num_hours();
    if hours < 24 {
        return plural(hours, "hour");
    }
    let days = elapsed.num_days();
    if days < 7 {
        return plural(days, "day");
    }
    if days < 31 {
        return plural(days / 7, "week");
    }
    if days < 365 {
        return plural(days / 30, "month");
    }
    plural(days / 365, "year")
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// Whether a point qualifies for lengthened retention.
pub fn is_salient(payload: &PointPayload, config: &TemporalConfig) -> bool {
    payload.importance >= config.salient_importance
        || payload.valence.abs() >= config.salient_valence
        || payload.arousal >= config.salient_arousal
}

/// Recall clarity in [0, 1] after `elapsed` time.
pub fn decay_factor(elapsed: Duration, payload: &PointPayload, config: &TemporalConfig) -> f32 {
    let hours = elapsed.num_seconds().max(0) as f32 / 3600.0;
    let mut half_life = config.half_life_hours;
    if is_salient(payload, config) {
        half_life *= config.salient_multiplier;
    }
    0.5_f32.powf(hours / half_life).clamp(0.0, 1.0)
}

/// Attach the temporal context and decay factor to a retrieved memory.
pub fn annotate(memory: &mut RetrievedMemory, now: DateTime<Utc>, config: &TemporalConfig) {
    let elapsed = (now - memory.payload.timestamp).max(Duration::zero());
    memory.temporal_context = Some(describe_elapsed(elapsed));
    memory.decay_factor = decay_factor(elapsed, &memory.payload, config);
}
