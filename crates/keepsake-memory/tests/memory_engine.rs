// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests of the memory engine over the SQLite stores.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use keepsake_config::KeepsakeConfig;
use keepsake_core::types::{
    EmbeddingInput, EmbeddingOutput, EmotionalState, PointPayload, RerankResult,
};
use keepsake_core::{
    Classification, ClassifierAdapter, EmbeddingAdapter, KeepsakeError, MemoryKind, MemoryPoint,
    MemorySource, Message, PointStore, RerankAdapter,
};
use keepsake_memory::relationship::RelationshipDelta;
use keepsake_memory::{MemoryEngine, RetrievalStrategy};
use keepsake_storage::{Database, SqliteKvStore, SqlitePointStore};
use uuid::Uuid;

const DIMENSION: usize = 8;

/// Embedder double: fixed vectors per text, hash-derived otherwise.
struct TestEmbedder {
    overrides: Mutex<HashMap<String, Vec<f32>>>,
    fail: bool,
}

impl TestEmbedder {
    fn new() -> Self {
        Self {
            overrides: Mutex::new(HashMap::new()),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            overrides: Mutex::new(HashMap::new()),
            fail: true,
        }
    }

    fn with(self, text: &str, vector: Vec<f32>) -> Self {
        self.overrides
            .lock()
            .unwrap()
            .insert(text.to_string(), vector);
        self
    }

    fn derive(text: &str) -> Vec<f32> {
        (0..DIMENSION)
            .map(|i| {
                let byte = text
                    .as_bytes()
                    .get(i % text.len().max(1))
                    .copied()
                    .unwrap_or(1);
                (byte as f32 * (i as f32 + 1.0)).sin()
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingAdapter for TestEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, KeepsakeError> {
        if self.fail {
            return Err(KeepsakeError::Embedding {
                message: "embedder offline".into(),
                source: None,
            });
        }
        let overrides = self.overrides.lock().unwrap();
        let embeddings: Vec<Vec<f32>> = input
            .texts
            .iter()
            .map(|t| overrides.get(t).cloned().unwrap_or_else(|| Self::derive(t)))
            .collect();
        Ok(EmbeddingOutput {
            dimensions: DIMENSION,
            embeddings,
        })
    }
}

struct TestClassifier;

#[async_trait]
impl ClassifierAdapter for TestClassifier {
    async fn classify(&self, text: &str) -> Result<Classification, KeepsakeError> {
        Ok(Classification {
            kind: MemoryKind::Episode,
            importance: 3,
            condensed: text.to_string(),
            valence: 0.1,
            arousal: 0.2,
            dimensions: BTreeMap::new(),
            triggers: Vec::new(),
        })
    }
}

/// Reranker double: scripted results or a scripted failure.
struct TestReranker {
    results: Option<Vec<RerankResult>>,
}

#[async_trait]
impl RerankAdapter for TestReranker {
    async fn rerank(
        &self,
        _query: &str,
        _documents: &[String],
    ) -> Result<Vec<RerankResult>, KeepsakeError> {
        match &self.results {
            Some(results) => Ok(results.clone()),
            None => Err(KeepsakeError::RetrievalStage {
                stage: "rerank",
                message: "reranker offline".into(),
            }),
        }
    }
}

fn config() -> KeepsakeConfig {
    let mut config = KeepsakeConfig::default();
    config.storage.collection_dimension = DIMENSION;
    // Generous retries keep the concurrency tests deterministic.
    config.cas.attempts = 25;
    config
}

async fn stores() -> (Arc<SqliteKvStore>, Arc<SqlitePointStore>) {
    let db = Arc::new(Database::open_in_memory().await.expect("open db"));
    (
        Arc::new(SqliteKvStore::new(Arc::clone(&db))),
        Arc::new(SqlitePointStore::new(db, DIMENSION)),
    )
}

fn engine_with(
    kv: Arc<SqliteKvStore>,
    points: Arc<SqlitePointStore>,
    embedder: TestEmbedder,
    reranker: TestReranker,
) -> MemoryEngine {
    MemoryEngine::new(
        kv,
        points,
        Arc::new(embedder),
        Arc::new(TestClassifier),
        Arc::new(reranker),
        &config(),
    )
}

fn message(context: &str, text: &str, second: u32) -> Message {
    Message {
        user_id: "u1".into(),
        context_id: context.into(),
        text: text.into(),
        message_id: None,
        timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, second).unwrap(),
    }
}

/// A unit basis vector; distinct points stay orthogonal so activation
/// cannot blur test expectations.
fn basis(axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIMENSION];
    v[axis % DIMENSION] = 1.0;
    v
}

fn seed_point(context: &str, text: &str, vector: Vec<f32>, hour: u32) -> MemoryPoint {
    MemoryPoint {
        id: Uuid::new_v4(),
        vector,
        payload: PointPayload {
            kind: MemoryKind::Fact,
            timestamp: Utc.with_ymd_and_hms(2026, 2, 1, hour, 0, 0).unwrap(),
            source_user: "u1".into(),
            source_context: context.into(),
            text_content: text.into(),
            importance: 3,
            valence: 0.1,
            arousal: 0.2,
            dimensions: BTreeMap::new(),
            triggers: Vec::new(),
        },
    }
}

#[tokio::test]
async fn sixteen_sequential_messages_leave_the_last_fifteen() {
    let (kv, points) = stores().await;
    let engine = engine_with(kv, points, TestEmbedder::new(), TestReranker { results: None });

    for n in 1..=16 {
        engine
            .observe(message("c1", &format!("message number {n}"), n))
            .await;
    }

    let context = engine
        .context_for_turn(
            "keepsake",
            &message("c1", "what did we talk about?", 17),
            &EmotionalState::neutral(),
        )
        .await
        .expect("turn context");

    assert_eq!(context.window.len(), 15);
    assert_eq!(context.window[0].text, "message number 2");
    assert_eq!(context.window[14].text, "message number 16");
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_observes_land_every_message() {
    let (kv, points) = stores().await;
    let engine = Arc::new(engine_with(
        kv,
        points,
        TestEmbedder::new(),
        TestReranker { results: None },
    ));

    let mut handles = Vec::new();
    for n in 1..=10u32 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .observe(message("busy", &format!("concurrent message {n}"), n))
                .await;
        }));
    }
    for handle in handles {
        handle.await.expect("observe task");
    }

    let context = engine
        .context_for_turn(
            "keepsake",
            &message("busy", "everything in?", 30),
            &EmotionalState::neutral(),
        )
        .await
        .expect("turn context");

    assert_eq!(context.window.len(), 10);
    let mut texts: Vec<&str> = context.window.iter().map(|m| m.text.as_str()).collect();
    texts.sort_unstable();
    texts.dedup();
    assert_eq!(texts.len(), 10, "no append may be lost");
}

#[tokio::test]
async fn precise_context_is_reranked_and_annotated() {
    let (kv, points) = stores().await;
    let query_vector = basis(0);

    let tea = seed_point("work_7", "the user drinks sencha daily", basis(0), 8);
    let deadline = seed_point("work_7", "the quarterly deadline is in march", basis(1), 9);
    let cat = seed_point("work_7", "the office cat is named miso", basis(2), 10);
    let deadline_id = deadline.id;
    points
        .upsert(vec![tea.clone(), deadline.clone(), cat.clone()])
        .await
        .expect("seed points");

    // The reranker promotes the deadline memory above the similarity
    // winner.
    let reranker = TestReranker {
        results: Some(vec![
            RerankResult { index: 0, score: 0.4 },
            RerankResult { index: 1, score: 0.95 },
            RerankResult { index: 2, score: 0.1 },
        ]),
    };
    let embedder = TestEmbedder::new().with("when is the deadline?", query_vector);
    let engine = engine_with(kv, points, embedder, reranker);

    let context = engine
        .context_for_turn(
            "keepsake",
            &message("work_7", "when is the deadline?", 1),
            &EmotionalState::neutral(),
        )
        .await
        .expect("turn context");

    assert_eq!(context.strategy, RetrievalStrategy::Precise);
    assert!(!context.memories.is_empty());
    assert_eq!(context.memories[0].id, deadline_id);

    // Dedup + annotation invariants.
    let ids: HashSet<Uuid> = context.memories.iter().map(|m| m.id).collect();
    assert_eq!(ids.len(), context.memories.len(), "no duplicate ids");
    for memory in &context.memories {
        assert!(memory.temporal_context.is_some());
        assert!(memory.decay_factor > 0.0 && memory.decay_factor <= 1.0);
    }
    engine.shutdown().await;
}

#[tokio::test]
async fn reranker_failure_keeps_similarity_order() {
    let (kv, points) = stores().await;

    let exact = seed_point("work_7", "exact match memory", basis(0), 8);
    let near = seed_point("work_7", "unrelated memory", basis(3), 9);
    let exact_id = exact.id;
    points.upsert(vec![exact, near]).await.expect("seed");

    let embedder = TestEmbedder::new().with("find the exact one", basis(0));
    let engine = engine_with(kv, points, embedder, TestReranker { results: None });

    let context = engine
        .context_for_turn(
            "keepsake",
            &message("work_7", "find the exact one", 1),
            &EmotionalState::neutral(),
        )
        .await
        .expect("turn context");

    assert_eq!(context.memories[0].id, exact_id, "similarity order preserved");
    engine.shutdown().await;
}

#[tokio::test]
async fn recent_context_returns_the_newest_memories() {
    let (kv, points) = stores().await;

    let mut seeded = Vec::new();
    for hour in 1..=5u32 {
        let p = seed_point(
            "casual_3",
            &format!("casual moment {hour}"),
            basis(hour as usize),
            hour,
        );
        seeded.push((p.id, hour));
        points.upsert(vec![p]).await.expect("seed");
    }

    let engine = engine_with(
        kv,
        points,
        TestEmbedder::new(),
        TestReranker { results: None },
    );
    let context = engine
        .context_for_turn(
            "keepsake",
            &message("casual_3", "hey, how are you?", 1),
            &EmotionalState::neutral(),
        )
        .await
        .expect("turn context");

    assert_eq!(context.strategy, RetrievalStrategy::Recent);
    assert_eq!(context.memories.len(), 3);
    assert_eq!(
        context.memories[0].payload.text_content, "casual moment 5",
        "newest memory leads"
    );
    assert!(
        context
            .memories
            .iter()
            .all(|m| m.source == MemorySource::Recent)
    );
    engine.shutdown().await;
}

#[tokio::test]
async fn embedding_failure_surfaces_to_the_caller() {
    let (kv, points) = stores().await;
    let engine = engine_with(
        kv,
        points,
        TestEmbedder::failing(),
        TestReranker { results: None },
    );

    let result = engine
        .context_for_turn(
            "keepsake",
            &message("work_1", "this cannot be embedded", 1),
            &EmotionalState::neutral(),
        )
        .await;

    assert!(matches!(result, Err(KeepsakeError::Embedding { .. })));
    engine.shutdown().await;
}

#[tokio::test]
async fn observed_messages_are_ingested_into_the_point_store() {
    let (kv, points) = stores().await;
    let engine = engine_with(
        kv,
        Arc::clone(&points),
        TestEmbedder::new(),
        TestReranker { results: None },
    );

    engine
        .observe(message("c1", "today I started learning the cello", 1))
        .await;
    engine.observe(message("c1", "ok", 2)).await; // below min length

    // Drain the worker so the write is visible.
    engine.shutdown().await;

    let stored = points.scroll("c1", 10).await.expect("scroll");
    assert_eq!(stored.len(), 1, "short message must be skipped");
    assert_eq!(
        stored[0].payload.text_content,
        "today I started learning the cello"
    );
    assert_eq!(stored[0].payload.kind, MemoryKind::Episode);
}

#[tokio::test]
async fn supplementation_fills_an_under_budget_context() {
    let (kv, points) = stores().await;
    let query_vector = basis(0);

    // One recent memory in the conversation's own context.
    let local = seed_point("casual_9", "we joked about the rain", basis(1), 5);

    // A mood-matched memory elsewhere: positive valence, high arousal,
    // similar to the query.
    let mut euphoric = seed_point("trip_2", "the rooftop concert last summer", basis(0), 6);
    euphoric.payload.valence = 0.9;
    euphoric.payload.arousal = 0.9;

    // A neutral memory, dissimilar enough to stay below the activation
    // threshold, reachable only through generic supplementation.
    let mut background = vec![0.0; DIMENSION];
    background[0] = 0.3;
    background[4] = 0.95;
    let generic = seed_point("notes_1", "the library closes at eight", background, 7);

    let euphoric_id = euphoric.id;
    let generic_id = generic.id;
    points
        .upsert(vec![local, euphoric, generic])
        .await
        .expect("seed");

    let embedder = TestEmbedder::new().with("remember that feeling?", query_vector);
    let engine = engine_with(kv, points, embedder, TestReranker { results: None });

    let mood = EmotionalState {
        valence: 0.8,
        arousal: 0.7,
        dimensions: BTreeMap::new(),
    };
    let context = engine
        .context_for_turn(
            "keepsake",
            &message("casual_9", "remember that feeling?", 1),
            &mood,
        )
        .await
        .expect("turn context");

    assert_eq!(context.memories.len(), 3, "budget filled from supplements");
    let by_id: HashMap<Uuid, MemorySource> = context
        .memories
        .iter()
        .map(|m| (m.id, m.source))
        .collect();
    assert_eq!(by_id.get(&euphoric_id), Some(&MemorySource::Emotional));
    assert_eq!(by_id.get(&generic_id), Some(&MemorySource::Retrieved));
    assert!(by_id.values().any(|s| *s == MemorySource::Recent));
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_relationship_updates_commit_sequential_versions() {
    let (kv, points) = stores().await;
    let engine = Arc::new(engine_with(
        kv,
        points,
        TestEmbedder::new(),
        TestReranker { results: None },
    ));

    let delta = || RelationshipDelta {
        dimensions: BTreeMap::from([("trust".to_string(), 0.05)]),
        ..RelationshipDelta::default()
    };

    let a = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.record_interaction("alice", "u1", delta()).await })
    };
    let b = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.record_interaction("alice", "u1", delta()).await })
    };

    let first = a.await.unwrap().expect("first update applies");
    let second = b.await.unwrap().expect("second update applies");

    let mut versions = [first.version, second.version];
    versions.sort_unstable();
    assert_eq!(versions, [1, 2], "one commit per version, no overwrites");

    let snapshot = engine.relationship("alice", "u1").await;
    assert_eq!(snapshot.version, 2);
    assert_eq!(snapshot.interaction_count, 2);
}
