// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory store and collaborator doubles for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use keepsake_core::traits::kv::ABSENT_VERSION;
use keepsake_core::types::cosine_similarity;
use keepsake_core::{
    Classification, ClassifierAdapter, EmbeddingAdapter, KeepsakeError, MemoryPoint, PointStore,
    RerankAdapter, ScoredPoint, SearchRequest, VersionedKvStore,
};
use keepsake_core::types::{EmbeddingInput, EmbeddingOutput, RerankResult};

/// In-memory versioned KV with the same CAS semantics as the SQLite store.
#[derive(Default)]
pub struct MemoryKv {
    records: Mutex<HashMap<(String, String), (serde_json::Value, u64)>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VersionedKvStore for MemoryKv {
    async fn read(
        &self,
        ns: &str,
        key: &str,
    ) -> Result<(Option<serde_json::Value>, u64), KeepsakeError> {
        let records = self.records.lock().unwrap();
        match records.get(&(ns.to_string(), key.to_string())) {
            Some((body, version)) => Ok((Some(body.clone()), *version)),
            None => Ok((None, ABSENT_VERSION)),
        }
    }

    async fn write_if(
        &self,
        ns: &str,
        key: &str,
        body: serde_json::Value,
        expected: u64,
    ) -> Result<bool, KeepsakeError> {
        let mut records = self.records.lock().unwrap();
        let slot = (ns.to_string(), key.to_string());
        match records.get(&slot) {
            None if expected == ABSENT_VERSION => {
                records.insert(slot, (body, 1));
                Ok(true)
            }
            Some((_, version)) if *version == expected => {
                records.insert(slot, (body, expected + 1));
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// KV wrapper that reports a version conflict for the first N writes.
pub struct FlakyKv {
    inner: MemoryKv,
    conflicts_left: AtomicU32,
}

impl FlakyKv {
    pub fn conflicting(conflicts: u32) -> Self {
        Self {
            inner: MemoryKv::new(),
            conflicts_left: AtomicU32::new(conflicts),
        }
    }
}

#[async_trait]
impl VersionedKvStore for FlakyKv {
    async fn read(
        &self,
        ns: &str,
        key: &str,
    ) -> Result<(Option<serde_json::Value>, u64), KeepsakeError> {
        self.inner.read(ns, key).await
    }

    async fn write_if(
        &self,
        ns: &str,
        key: &str,
        body: serde_json::Value,
        expected: u64,
    ) -> Result<bool, KeepsakeError> {
        if self
            .conflicts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Ok(false);
        }
        self.inner.write_if(ns, key, body, expected).await
    }
}

/// In-memory point store with cosine scoring, mirroring the SQLite
/// implementation's filter semantics.
pub struct MemoryPointStore {
    dimension: usize,
    points: Mutex<Vec<MemoryPoint>>,
}

impl MemoryPointStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            points: Mutex::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.points.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PointStore for MemoryPointStore {
    async fn upsert(&self, points: Vec<MemoryPoint>) -> Result<(), KeepsakeError> {
        for point in &points {
            if point.vector.len() != self.dimension {
                return Err(KeepsakeError::DimensionMismatch {
                    expected: self.dimension,
                    actual: point.vector.len(),
                });
            }
        }
        self.points.lock().unwrap().extend(points);
        Ok(())
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<ScoredPoint>, KeepsakeError> {
        let points = self.points.lock().unwrap();
        let mut scored: Vec<ScoredPoint> = points
            .iter()
            .filter(|p| {
                request
                    .filter
                    .context
                    .as_ref()
                    .is_none_or(|c| &p.payload.source_context == c)
            })
            .filter(|p| {
                request
                    .filter
                    .valence
                    .is_none_or(|(lo, hi)| p.payload.valence >= lo && p.payload.valence <= hi)
            })
            .filter(|p| {
                request
                    .filter
                    .arousal
                    .is_none_or(|(lo, hi)| p.payload.arousal >= lo && p.payload.arousal <= hi)
            })
            .filter(|p| !request.exclude.contains(&p.id))
            .filter_map(|p| {
                let score = cosine_similarity(&request.vector, &p.vector);
                if request.min_score.is_some_and(|floor| score < floor) {
                    return None;
                }
                Some(ScoredPoint {
                    id: p.id,
                    vector: p.vector.clone(),
                    payload: p.payload.clone(),
                    score,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(request.limit);
        Ok(scored)
    }

    async fn scroll(
        &self,
        context: &str,
        limit: usize,
    ) -> Result<Vec<MemoryPoint>, KeepsakeError> {
        let points = self.points.lock().unwrap();
        let mut matching: Vec<MemoryPoint> = points
            .iter()
            .filter(|p| p.payload.source_context == context)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.payload.timestamp.cmp(&a.payload.timestamp));
        matching.truncate(limit);
        Ok(matching)
    }
}

/// Deterministic embedder: per-text overrides with a hash-derived default.
pub struct StaticEmbedder {
    dimension: usize,
    overrides: Mutex<HashMap<String, Vec<f32>>>,
    fail: bool,
}

impl StaticEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            overrides: Mutex::new(HashMap::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            dimension: 0,
            overrides: Mutex::new(HashMap::new()),
            fail: true,
        }
    }

    pub fn with(self, text: &str, vector: Vec<f32>) -> Self {
        self.overrides
            .lock()
            .unwrap()
            .insert(text.to_string(), vector);
        self
    }

    fn derive(&self, text: &str) -> Vec<f32> {
        // Deterministic pseudo-embedding so unrelated texts rarely collide.
        (0..self.dimension)
            .map(|i| {
                let byte = text.as_bytes().get(i % text.len().max(1)).copied().unwrap_or(1);
                (byte as f32 * (i as f32 + 1.0)).sin()
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingAdapter for StaticEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, KeepsakeError> {
        if self.fail {
            return Err(KeepsakeError::Embedding {
                message: "embedder configured to fail".into(),
                source: None,
            });
        }
        let overrides = self.overrides.lock().unwrap();
        let embeddings: Vec<Vec<f32>> = input
            .texts
            .iter()
            .map(|t| overrides.get(t).cloned().unwrap_or_else(|| self.derive(t)))
            .collect();
        Ok(EmbeddingOutput {
            dimensions: embeddings.first().map(Vec::len).unwrap_or(self.dimension),
            embeddings,
        })
    }
}

/// Classifier double: a fixed classification or a scripted failure.
pub struct ScriptedClassifier {
    result: Option<Classification>,
}

impl ScriptedClassifier {
    pub fn returning(classification: Classification) -> Self {
        Self {
            result: Some(classification),
        }
    }

    pub fn failing() -> Self {
        Self { result: None }
    }
}

#[async_trait]
impl ClassifierAdapter for ScriptedClassifier {
    async fn classify(&self, _text: &str) -> Result<Classification, KeepsakeError> {
        match &self.result {
            Some(c) => Ok(c.clone()),
            None => Err(KeepsakeError::Classification {
                message: "classifier configured to fail".into(),
                source: None,
            }),
        }
    }
}

/// Reranker double: fixed results, an empty answer, or a failure.
pub enum ScriptedReranker {
    Results(Vec<RerankResult>),
    Empty,
    Failing,
}

#[async_trait]
impl RerankAdapter for ScriptedReranker {
    async fn rerank(
        &self,
        _query: &str,
        _documents: &[String],
    ) -> Result<Vec<RerankResult>, KeepsakeError> {
        match self {
            ScriptedReranker::Results(results) => Ok(results.clone()),
            ScriptedReranker::Empty => Ok(Vec::new()),
            ScriptedReranker::Failing => Err(KeepsakeError::RetrievalStage {
                stage: "rerank",
                message: "reranker configured to fail".into(),
            }),
        }
    }
}
