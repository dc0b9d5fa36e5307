// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The memory engine facade.
//!
//! One dependency-injected object wires the conversation window, the
//! relationship engine, the retrieval pipeline, and the ingestion
//! worker. Constructed once by the embedding application and passed by
//! reference; there is no module-level state.

use std::sync::Arc;
use std::time::Duration;

use keepsake_config::KeepsakeConfig;
use keepsake_core::types::EmotionalState;
use keepsake_core::{
    ClassifierAdapter, EmbeddingAdapter, KeepsakeError, Message, PointStore, RelationshipRecord,
    RerankAdapter, RetrievedMemory, VersionedKvStore,
};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::cas::RetryPolicy;
use crate::ingest::{self, IngestionHandle};
use crate::relationship::{RelationshipDelta, RelationshipEngine};
use crate::retrieval::{RetrievalPipeline, RetrievalQuery};
use crate::strategy::{RetrievalStrategy, select_strategy};
use crate::window::ConversationWindow;

/// Everything a turn needs from the memory subsystem.
#[derive(Debug)]
pub struct TurnContext {
    /// Short-term window, oldest first.
    pub window: Vec<Message>,
    /// Strategy the retrieval ran with.
    pub strategy: RetrievalStrategy,
    /// Relationship snapshot (possibly stale under store degradation).
    pub relationship: RelationshipRecord,
    /// Ranked, temporally annotated long-term memories.
    pub memories: Vec<RetrievedMemory>,
}

/// The assembled memory subsystem.
pub struct MemoryEngine {
    window: ConversationWindow,
    relationships: RelationshipEngine,
    pipeline: RetrievalPipeline,
    ingestion: IngestionHandle,
    worker: JoinHandle<()>,
    turn_deadline: Duration,
}

impl MemoryEngine {
    /// Wire the engine from its injected collaborators and spawn the
    /// ingestion worker.
    pub fn new(
        kv: Arc<dyn VersionedKvStore>,
        points: Arc<dyn PointStore>,
        embedder: Arc<dyn EmbeddingAdapter>,
        classifier: Arc<dyn ClassifierAdapter>,
        reranker: Arc<dyn RerankAdapter>,
        config: &KeepsakeConfig,
    ) -> Self {
        let policy = RetryPolicy::from_config(&config.cas);
        let window = ConversationWindow::new(Arc::clone(&kv), policy, &config.stm);
        let relationships =
            RelationshipEngine::new(kv, policy, config.relationship.clone());
        let pipeline = RetrievalPipeline::new(
            Arc::clone(&points),
            Arc::clone(&embedder),
            reranker,
            config,
        );
        let (ingestion, worker) = ingest::spawn(
            classifier,
            embedder,
            points,
            config.ingestion.clone(),
            config.storage.collection_dimension,
        );
        Self {
            window,
            relationships,
            pipeline,
            ingestion,
            worker,
            turn_deadline: Duration::from_secs(config.retrieval.turn_deadline_secs),
        }
    }

    /// Record an inbound message: append it to the conversation window
    /// (linearized per conversation by CAS) and hand a copy to the
    /// ingestion worker fire-and-forget.
    ///
    /// Returns the resulting window. The ingested point is NOT
    /// guaranteed visible to this turn's retrieval.
    pub async fn observe(&self, message: Message) -> Vec<Message> {
        self.ingestion.enqueue(message.clone());
        let conversation_id = message.context_id.clone();
        self.window.append(&conversation_id, message).await
    }

    /// Assemble the working context for one turn.
    ///
    /// The window read and relationship snapshot are data-independent
    /// and run concurrently. Retrieval runs under an aggregate deadline;
    /// on expiry the turn proceeds without memories. Only a failed query
    /// embedding surfaces as an error, leaving the memory-less decision
    /// to the caller.
    pub async fn context_for_turn(
        &self,
        subject_id: &str,
        message: &Message,
        mood: &EmotionalState,
    ) -> Result<TurnContext, KeepsakeError> {
        let strategy = select_strategy(&message.context_id);

        let (window, relationship) = tokio::join!(
            self.window.get(&message.context_id),
            self.relationships.snapshot(subject_id, &message.user_id),
        );

        let query = RetrievalQuery {
            context_id: message.context_id.clone(),
            text: message.text.clone(),
        };
        let memories = match tokio::time::timeout(
            self.turn_deadline,
            self.pipeline.retrieve(strategy, &query, mood),
        )
        .await
        {
            Ok(Ok(memories)) => memories,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!(
                    deadline = ?self.turn_deadline,
                    "turn retrieval deadline exceeded; proceeding without memories"
                );
                Vec::new()
            }
        };

        Ok(TurnContext {
            window,
            strategy,
            relationship,
            memories,
        })
    }

    /// Current relationship snapshot (lazily defaulted).
    pub async fn relationship(&self, subject_id: &str, entity_id: &str) -> RelationshipRecord {
        self.relationships.snapshot(subject_id, entity_id).await
    }

    /// Apply one analyzed interaction's relationship delta.
    ///
    /// `None` means the update was not applied (CAS retries exhausted);
    /// the caller must not assume success.
    pub async fn record_interaction(
        &self,
        subject_id: &str,
        entity_id: &str,
        delta: RelationshipDelta,
    ) -> Option<RelationshipRecord> {
        self.relationships.apply(subject_id, entity_id, delta).await
    }

    /// Close the ingestion channel and wait for the worker to drain.
    pub async fn shutdown(self) {
        let MemoryEngine {
            ingestion, worker, ..
        } = self;
        drop(ingestion);
        if let Err(e) = worker.await {
            warn!(error = %e, "ingestion worker did not exit cleanly");
        }
    }
}
