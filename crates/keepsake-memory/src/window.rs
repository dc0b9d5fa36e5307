// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Short-term conversation window (STM).
//!
//! A bounded, oldest-first message list per conversation id, kept
//! consistent under concurrent appends by the CAS updater. Reads and
//! writes both degrade rather than block: an unreachable store reads as
//! an empty window, and exhausted append retries return the last
//! computed (possibly stale) list.

use std::sync::Arc;

use keepsake_config::model::StmConfig;
use keepsake_core::traits::kv::STM_NAMESPACE;
use keepsake_core::{Message, VersionedKvStore};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cas::{CasUpdater, RetryPolicy, UpdateOutcome, Versioned};

/// Stored body of one conversation window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WindowRecord {
    messages: Vec<Message>,
    #[serde(default)]
    version: u64,
}

impl Versioned for WindowRecord {
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// Bounded recent-message window store, keyed by conversation id.
pub struct ConversationWindow {
    updater: CasUpdater,
    window_size: usize,
}

impl ConversationWindow {
    pub fn new(kv: Arc<dyn VersionedKvStore>, policy: RetryPolicy, config: &StmConfig) -> Self {
        Self {
            updater: CasUpdater::new(kv, policy),
            window_size: config.window_size,
        }
    }

    /// The window for a conversation, oldest first.
    ///
    /// Store unavailability is non-fatal and reads as an empty window.
    pub async fn get(&self, conversation_id: &str) -> Vec<Message> {
        match self
            .updater
            .read_or_default(STM_NAMESPACE, conversation_id, WindowRecord::default)
            .await
        {
            Ok(record) => record.messages,
            Err(e) => {
                warn!(conversation_id, error = %e, "window read failed; treating as empty");
                Vec::new()
            }
        }
    }

    /// Append a message and prune to the configured window size.
    ///
    /// Returns the resulting window. When CAS retries exhaust, the last
    /// computed list is returned as best-effort so the turn is never
    /// blocked indefinitely.
    pub async fn append(&self, conversation_id: &str, message: Message) -> Vec<Message> {
        let window_size = self.window_size;
        let outcome = self
            .updater
            .update(
                STM_NAMESPACE,
                conversation_id,
                WindowRecord::default,
                |record: &mut WindowRecord| {
                    record.messages.push(message.clone());
                    let overflow = record.messages.len().saturating_sub(window_size);
                    if overflow > 0 {
                        record.messages.drain(..overflow);
                    }
                },
            )
            .await;

        match outcome {
            UpdateOutcome::Applied(record) => record.messages,
            UpdateOutcome::NotApplied(Some(record)) => {
                warn!(
                    conversation_id,
                    "append retries exhausted; returning best-effort window"
                );
                record.messages
            }
            UpdateOutcome::NotApplied(None) => {
                warn!(
                    conversation_id,
                    "append retries exhausted with no readable window"
                );
                Vec::new()
            }
        }
    }
}
