// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generic CAS-retry updater over the versioned KV store.
//!
//! One read-merge-write loop serves every versioned record in the
//! system: the conversation window prunes through it and the
//! relationship engine merges dimension deltas through it. Conflicts
//! and transient store errors consume attempts; exhaustion reports
//! "not applied" rather than blocking the turn.

use std::sync::Arc;
use std::time::Duration;

use keepsake_core::traits::kv::ABSENT_VERSION;
use keepsake_core::{KeepsakeError, VersionedKvStore};
use rand::Rng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Retry policy for optimistic-concurrency writes.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts before giving up.
    pub attempts: u32,
    /// Lower bound of the jittered conflict backoff.
    pub backoff_min: Duration,
    /// Upper bound of the jittered conflict backoff.
    pub backoff_max: Duration,
}

impl RetryPolicy {
    /// Build a policy from the `[cas]` config section.
    pub fn from_config(config: &keepsake_config::model::CasConfig) -> Self {
        Self {
            attempts: config.attempts,
            backoff_min: Duration::from_millis(config.backoff_min_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_min: Duration::from_millis(20),
            backoff_max: Duration::from_millis(70),
        }
    }
}

/// A record whose body mirrors the store's version token.
///
/// The updater stamps the current token onto the value before handing
/// it to the mutation, and the committed token after a successful
/// write, so record bodies and store tokens never drift apart.
pub trait Versioned {
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

/// Outcome of a CAS update.
#[derive(Debug)]
pub enum UpdateOutcome<T> {
    /// The merged value was committed.
    Applied(T),
    /// Attempts exhausted without a commit. Carries the last merged
    /// candidate (possibly stale) when at least one attempt computed
    /// one; callers must not assume the write took effect.
    NotApplied(Option<T>),
}

impl<T> UpdateOutcome<T> {
    /// The committed value, or `None` when the update was not applied.
    pub fn applied(self) -> Option<T> {
        match self {
            UpdateOutcome::Applied(value) => Some(value),
            UpdateOutcome::NotApplied(_) => None,
        }
    }
}

/// Generic read-merge-write-under-optimistic-concurrency primitive.
pub struct CasUpdater {
    kv: Arc<dyn VersionedKvStore>,
    policy: RetryPolicy,
}

impl CasUpdater {
    pub fn new(kv: Arc<dyn VersionedKvStore>, policy: RetryPolicy) -> Self {
        Self { kv, policy }
    }

    /// Read a record, synthesizing a deterministic default when absent.
    ///
    /// The default is persisted best-effort without blocking the read:
    /// a lost creation race re-reads the winner, and a store error on
    /// the persist only logs.
    pub async fn read_or_default<T, D>(
        &self,
        ns: &str,
        key: &str,
        default_fn: D,
    ) -> Result<T, KeepsakeError>
    where
        T: Serialize + DeserializeOwned + Versioned,
        D: FnOnce() -> T,
    {
        let (value, token) = self.kv.read(ns, key).await?;
        if let Some(body) = value {
            let mut record: T = serde_json::from_value(body).map_err(KeepsakeError::storage)?;
            record.set_version(token);
            return Ok(record);
        }

        let mut fresh = default_fn();
        fresh.set_version(ABSENT_VERSION + 1);
        match serde_json::to_value(&fresh) {
            Ok(body) => match self.kv.write_if(ns, key, body, ABSENT_VERSION).await {
                Ok(true) => {}
                Ok(false) => {
                    // A concurrent writer created the record first;
                    // prefer its value when we can get it.
                    if let Ok((Some(body), token)) = self.kv.read(ns, key).await
                        && let Ok(mut record) = serde_json::from_value::<T>(body)
                    {
                        record.set_version(token);
                        return Ok(record);
                    }
                }
                Err(e) => {
                    warn!(ns, key, error = %e, "failed to persist synthesized default");
                }
            },
            Err(e) => {
                warn!(ns, key, error = %e, "synthesized default not serializable");
            }
        }
        Ok(fresh)
    }

    /// Run `mutate` against the latest record value and commit it with a
    /// conditional write, retrying on conflict per the policy.
    ///
    /// The mutation sees the record stamped with the token it was read
    /// at; the committed value carries the incremented token.
    pub async fn update<T, D, M>(
        &self,
        ns: &str,
        key: &str,
        default_fn: D,
        mut mutate: M,
    ) -> UpdateOutcome<T>
    where
        T: Serialize + DeserializeOwned + Versioned,
        D: Fn() -> T,
        M: FnMut(&mut T),
    {
        let mut last_candidate = None;

        for attempt in 0..self.policy.attempts {
            if attempt > 0 {
                self.backoff().await;
            }

            let (value, token) = match self.kv.read(ns, key).await {
                Ok(read) => read,
                Err(e) => {
                    warn!(ns, key, attempt, error = %e, "versioned read failed");
                    continue;
                }
            };

            let mut candidate: T = match value {
                Some(body) => match serde_json::from_value(body) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        warn!(ns, key, error = %e, "stored record unreadable; merging into default");
                        default_fn()
                    }
                },
                None => default_fn(),
            };
            candidate.set_version(token);
            mutate(&mut candidate);
            candidate.set_version(token + 1);

            let body = match serde_json::to_value(&candidate) {
                Ok(body) => body,
                Err(e) => {
                    warn!(ns, key, error = %e, "merged record not serializable");
                    return UpdateOutcome::NotApplied(last_candidate);
                }
            };

            match self.kv.write_if(ns, key, body, token).await {
                Ok(true) => return UpdateOutcome::Applied(candidate),
                Ok(false) => {
                    debug!(ns, key, attempt, token, "version conflict; retrying");
                    last_candidate = Some(candidate);
                }
                Err(e) => {
                    warn!(ns, key, attempt, error = %e, "conditional write failed");
                    last_candidate = Some(candidate);
                }
            }
        }

        UpdateOutcome::NotApplied(last_candidate)
    }

    async fn backoff(&self) {
        let min = self.policy.backoff_min.as_millis() as u64;
        let max = self.policy.backoff_max.as_millis() as u64;
        let ms = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
