// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous ingestion worker.
//!
//! Consumes messages from a bounded channel, decoupled from the response
//! path: enqueueing never waits, and nothing here adds latency to turn
//! generation. Each job is classified (with a degraded fallback), embedded,
//! dimension-checked, and written as a fresh memory point.
//!
//! There is deliberately no read-your-own-write guarantee: a message
//! ingested this turn is not visible to the same turn's retrieval.

use std::sync::Arc;
use std::time::Duration;

use keepsake_config::model::IngestionConfig;
use keepsake_core::types::{EmbeddingInput, clamp_signed_unit, clamp_unit};
use keepsake_core::{
    Classification, ClassifierAdapter, EmbeddingAdapter, MemoryPoint, Message, PointPayload,
    PointStore,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Cheap cloneable sender half handed to the request path.
#[derive(Clone)]
pub struct IngestionHandle {
    tx: mpsc::Sender<Message>,
}

impl IngestionHandle {
    /// Fire-and-forget enqueue.
    ///
    /// A full (or closed) queue drops the message with a warning rather
    /// than blocking the turn. Returns whether the message was accepted.
    pub fn enqueue(&self, message: Message) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(m)) => {
                warn!(context_id = %m.context_id, "ingestion queue full; dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(m)) => {
                warn!(context_id = %m.context_id, "ingestion worker gone; dropping message");
                false
            }
        }
    }
}

/// Spawn the ingestion worker, returning the sender handle and the
/// worker's join handle (for graceful drain on shutdown).
pub fn spawn(
    classifier: Arc<dyn ClassifierAdapter>,
    embedder: Arc<dyn EmbeddingAdapter>,
    points: Arc<dyn PointStore>,
    config: IngestionConfig,
    collection_dimension: usize,
) -> (IngestionHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.queue_capacity);
    let worker = IngestionWorker {
        classifier,
        embedder,
        points,
        config,
        collection_dimension,
    };
    let handle = tokio::spawn(worker.run(rx));
    (IngestionHandle { tx }, handle)
}

struct IngestionWorker {
    classifier: Arc<dyn ClassifierAdapter>,
    embedder: Arc<dyn EmbeddingAdapter>,
    points: Arc<dyn PointStore>,
    config: IngestionConfig,
    collection_dimension: usize,
}

impl IngestionWorker {
    async fn run(self, mut rx: mpsc::Receiver<Message>) {
        while let Some(message) = rx.recv().await {
            self.process(message).await;
        }
        debug!("ingestion channel closed; worker exiting");
    }

    /// Process one job. Every outcome is a decision: skipped (too
    /// short), degraded (classifier down), dropped (embedding failure or
    /// dimension mismatch), or written.
    async fn process(&self, message: Message) {
        if message.text.chars().count() < self.config.min_message_len {
            debug!(
                context_id = %message.context_id,
                "message below minimum length; skipping ingestion"
            );
            return;
        }

        let classification = self.classify(&message.text).await;

        let vector = match self.embed(&classification.condensed).await {
            Some(vector) => vector,
            None => return,
        };
        if vector.len() != self.collection_dimension {
            // Hard correctness rule: a mismatched point is dropped,
            // never written.
            warn!(
                expected = self.collection_dimension,
                actual = vector.len(),
                context_id = %message.context_id,
                "embedding dimension mismatch; dropping point"
            );
            return;
        }

        let point = MemoryPoint {
            id: Uuid::new_v4(),
            vector,
            payload: PointPayload {
                kind: classification.kind,
                timestamp: message.timestamp,
                source_user: message.user_id,
                source_context: message.context_id,
                text_content: classification.condensed,
                importance: classification.importance.clamp(1, 5),
                valence: clamp_signed_unit(classification.valence),
                arousal: clamp_unit(classification.arousal),
                dimensions: classification
                    .dimensions
                    .into_iter()
                    .map(|(name, value)| (name, clamp_unit(value)))
                    .collect(),
                triggers: classification.triggers,
            },
        };

        if let Err(e) = self.points.upsert(vec![point]).await {
            warn!(error = %e, "failed to write memory point");
        }
    }

    async fn classify(&self, text: &str) -> Classification {
        let limit = Duration::from_secs(self.config.classify_timeout_secs);
        match tokio::time::timeout(limit, self.classifier.classify(text)).await {
            Ok(Ok(classification)) => classification,
            Ok(Err(e)) => {
                warn!(error = %e, "classifier failed; storing as unknown");
                Classification::unknown(text)
            }
            Err(_) => {
                warn!(timeout = ?limit, "classifier timed out; storing as unknown");
                Classification::unknown(text)
            }
        }
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let limit = Duration::from_secs(self.config.embed_timeout_secs);
        let result = tokio::time::timeout(
            limit,
            self.embedder.embed(EmbeddingInput {
                texts: vec![text.to_string()],
            }),
        )
        .await;
        match result {
            Ok(Ok(output)) => match output.embeddings.into_iter().next() {
                Some(vector) => Some(vector),
                None => {
                    warn!("embedder returned no vectors; dropping point");
                    None
                }
            },
            Ok(Err(e)) => {
                warn!(error = %e, "embedding failed; dropping point");
                None
            }
            Err(_) => {
                warn!(timeout = ?limit, "embedding timed out; dropping point");
                None
            }
        }
    }
}
