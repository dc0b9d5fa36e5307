// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The retrieval pipeline: strategy branch, supplementation stages,
//! merge, and temporal annotation.
//!
//! Failure semantics: the initial query embedding is the one
//! mandatory-fatal step and surfaces to the caller. Every other stage is
//! isolated; a failure or timeout degrades that stage to zero
//! contribution and the pipeline still returns a (possibly empty) list.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use keepsake_config::KeepsakeConfig;
use keepsake_config::model::{ActivationConfig, RetrievalConfig, TemporalConfig};
use keepsake_core::types::{EmbeddingInput, EmotionalState, PointFilter};
use keepsake_core::{
    EmbeddingAdapter, KeepsakeError, MemorySource, PointStore, RerankAdapter, RetrievedMemory,
    ScoreKind, SearchRequest,
};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Candidate, activation, emotional, temporal};
use crate::strategy::RetrievalStrategy;

/// One turn's retrieval input.
#[derive(Debug, Clone)]
pub struct RetrievalQuery {
    /// Conversation/context id the turn belongs to.
    pub context_id: String,
    /// The current message text.
    pub text: String,
}

/// Dependency-injected retrieval pipeline.
pub struct RetrievalPipeline {
    points: Arc<dyn PointStore>,
    embedder: Arc<dyn EmbeddingAdapter>,
    reranker: Arc<dyn RerankAdapter>,
    retrieval: RetrievalConfig,
    activation: ActivationConfig,
    temporal: TemporalConfig,
    store_timeout: Duration,
}

impl RetrievalPipeline {
    pub fn new(
        points: Arc<dyn PointStore>,
        embedder: Arc<dyn EmbeddingAdapter>,
        reranker: Arc<dyn RerankAdapter>,
        config: &KeepsakeConfig,
    ) -> Self {
        Self {
            points,
            embedder,
            reranker,
            retrieval: config.retrieval.clone(),
            activation: config.activation.clone(),
            temporal: config.temporal.clone(),
            store_timeout: Duration::from_secs(config.storage.timeout_secs),
        }
    }

    /// Produce the ranked, temporally annotated working context for a
    /// turn: at most `prompt_budget` deduplicated memories.
    pub async fn retrieve(
        &self,
        strategy: RetrievalStrategy,
        query: &RetrievalQuery,
        mood: &EmotionalState,
    ) -> Result<Vec<RetrievedMemory>, KeepsakeError> {
        // The one mandatory-fatal step; the caller decides whether to
        // proceed memory-less.
        let query_vector = self.embed_query(&query.text).await?;

        let mut selected = match strategy {
            RetrievalStrategy::Precise => self.precise_candidates(query, &query_vector, mood).await,
            RetrievalStrategy::Recent => self.recent_candidates(query, mood).await,
        };

        let budget = self.retrieval.prompt_budget;

        // Emotional supplementation: fill toward the budget with
        // mood-bucket matches.
        if selected.len() < budget {
            match self.emotional_supplement(&query_vector, mood, &selected).await {
                Ok(extra) => selected.extend(extra),
                Err(e) => {
                    warn!(stage = "emotional", error = %e, "stage degraded to zero contribution");
                }
            }
        }

        // Spreading activation from the strongest candidates.
        let seeds = top_candidates(&selected, self.activation.max_seeds);
        if !seeds.is_empty() {
            let visited: HashSet<Uuid> = selected.iter().map(|c| c.id).collect();
            match activation::spread(
                &self.points,
                &seeds,
                &visited,
                &self.activation,
                self.store_timeout,
            )
            .await
            {
                Ok(novel) => selected.extend(novel),
                Err(e) => {
                    warn!(stage = "activation", error = %e, "stage degraded to zero contribution");
                }
            }
        }

        // Generic supplementation: one unconstrained search if still
        // under budget.
        if selected.len() < budget {
            match self.generic_supplement(&query_vector, &selected).await {
                Ok(extra) => selected.extend(extra),
                Err(e) => {
                    warn!(stage = "supplement", error = %e, "stage degraded to zero contribution");
                }
            }
        }

        let mut memories = merge(selected, budget);

        let now = Utc::now();
        for memory in &mut memories {
            temporal::annotate(memory, now, &self.temporal);
        }
        Ok(memories)
    }

    /// Precise path: context-filtered vector search, best-effort rerank,
    /// emotional rescale, top `rerank_top_n`.
    async fn precise_candidates(
        &self,
        query: &RetrievalQuery,
        query_vector: &[f32],
        mood: &EmotionalState,
    ) -> Vec<Candidate> {
        let request = SearchRequest {
            vector: query_vector.to_vec(),
            limit: self.retrieval.search_limit,
            filter: PointFilter::for_context(&query.context_id),
            ..SearchRequest::default()
        };
        let hits = match self.search_with_timeout(request).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(stage = "search", error = %e, "primary search degraded to zero contribution");
                return Vec::new();
            }
        };

        let mut candidates: Vec<Candidate> = hits
            .into_iter()
            .map(|hit| Candidate {
                id: hit.id,
                vector: hit.vector,
                payload: hit.payload,
                score: ScoreKind::Similarity(hit.score),
                source: MemorySource::Retrieved,
            })
            .collect();

        // Best-effort rerank: failure or an empty result keeps the
        // similarity order.
        if let Some(results) = self.rerank(&query.text, &candidates).await {
            for result in results {
                if let Some(candidate) = candidates.get_mut(result.index) {
                    candidate.score = ScoreKind::Rerank(result.score);
                }
            }
        }

        rescale_and_rank(&mut candidates, mood);
        candidates.truncate(self.retrieval.rerank_top_n);
        candidates
    }

    /// Recent path: recency scroll with a rank-derived prior, emotional
    /// rescale, top `recent_limit`.
    async fn recent_candidates(
        &self,
        query: &RetrievalQuery,
        mood: &EmotionalState,
    ) -> Vec<Candidate> {
        // Overscan so the emotional rescale has room to re-sort.
        let limit = self.retrieval.recent_limit * 3;
        let scroll = tokio::time::timeout(
            self.store_timeout,
            self.points.scroll(&query.context_id, limit),
        )
        .await;
        let points = match scroll {
            Ok(Ok(points)) => points,
            Ok(Err(e)) => {
                warn!(stage = "scroll", error = %e, "recency scan degraded to zero contribution");
                return Vec::new();
            }
            Err(_) => {
                warn!(stage = "scroll", "recency scan timed out");
                return Vec::new();
            }
        };

        let count = points.len().max(1) as f32;
        let mut candidates: Vec<Candidate> = points
            .into_iter()
            .enumerate()
            .map(|(rank, point)| Candidate {
                // Newest-first recency prior on (0, 1]; gives the
                // rescale a stable ordering to work against.
                score: ScoreKind::Similarity(1.0 - rank as f32 / count),
                id: point.id,
                vector: point.vector,
                payload: point.payload,
                source: MemorySource::Recent,
            })
            .collect();

        rescale_and_rank(&mut candidates, mood);
        candidates.truncate(self.retrieval.recent_limit);
        candidates
    }

    /// Second vector search constrained to the mood's valence/arousal
    /// buckets, with a minimum-score floor.
    async fn emotional_supplement(
        &self,
        query_vector: &[f32],
        mood: &EmotionalState,
        selected: &[Candidate],
    ) -> Result<Vec<Candidate>, KeepsakeError> {
        let request = SearchRequest {
            vector: query_vector.to_vec(),
            limit: self.retrieval.prompt_budget,
            filter: PointFilter {
                context: None,
                valence: Some(emotional::valence_range(mood.valence, &self.retrieval)),
                arousal: Some(emotional::arousal_range(mood.arousal, &self.retrieval)),
            },
            exclude: selected.iter().map(|c| c.id).collect(),
            min_score: Some(self.retrieval.emotional_floor),
        };
        let hits = self.search_with_timeout(request).await?;
        Ok(hits
            .into_iter()
            .map(|hit| Candidate {
                id: hit.id,
                vector: hit.vector,
                payload: hit.payload,
                score: ScoreKind::Similarity(hit.score),
                source: MemorySource::Emotional,
            })
            .collect())
    }

    /// One unconstrained search excluding everything already selected.
    async fn generic_supplement(
        &self,
        query_vector: &[f32],
        selected: &[Candidate],
    ) -> Result<Vec<Candidate>, KeepsakeError> {
        let request = SearchRequest {
            vector: query_vector.to_vec(),
            limit: self.retrieval.prompt_budget,
            exclude: selected.iter().map(|c| c.id).collect(),
            ..SearchRequest::default()
        };
        let hits = self.search_with_timeout(request).await?;
        Ok(hits
            .into_iter()
            .map(|hit| Candidate {
                id: hit.id,
                vector: hit.vector,
                payload: hit.payload,
                score: ScoreKind::Similarity(hit.score),
                source: MemorySource::Retrieved,
            })
            .collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, KeepsakeError> {
        let limit = Duration::from_secs(self.retrieval.embed_timeout_secs);
        let output = tokio::time::timeout(
            limit,
            self.embedder.embed(EmbeddingInput {
                texts: vec![text.to_string()],
            }),
        )
        .await
        .map_err(|_| KeepsakeError::Timeout { duration: limit })??;
        output
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| KeepsakeError::Embedding {
                message: "embedder returned no vectors".into(),
                source: None,
            })
    }

    async fn rerank(
        &self,
        query_text: &str,
        candidates: &[Candidate],
    ) -> Option<Vec<keepsake_core::types::RerankResult>> {
        if candidates.is_empty() {
            return None;
        }
        let documents: Vec<String> = candidates
            .iter()
            .map(|c| c.payload.text_content.clone())
            .collect();
        let limit = Duration::from_secs(self.retrieval.rerank_timeout_secs);
        match tokio::time::timeout(limit, self.reranker.rerank(query_text, &documents)).await {
            Ok(Ok(results)) if !results.is_empty() => Some(results),
            Ok(Ok(_)) => {
                debug!("reranker returned nothing; keeping similarity order");
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "reranker failed; keeping similarity order");
                None
            }
            Err(_) => {
                warn!(timeout = ?limit, "reranker timed out; keeping similarity order");
                None
            }
        }
    }

    async fn search_with_timeout(
        &self,
        request: SearchRequest,
    ) -> Result<Vec<keepsake_core::ScoredPoint>, KeepsakeError> {
        tokio::time::timeout(self.store_timeout, self.points.search(request))
            .await
            .map_err(|_| KeepsakeError::Timeout {
                duration: self.store_timeout,
            })?
    }
}

/// Apply the emotional rescale to every candidate and sort by priority.
fn rescale_and_rank(candidates: &mut [Candidate], mood: &EmotionalState) {
    for candidate in candidates.iter_mut() {
        let factor = emotional::rescale_factor(emotional::affinity(mood, &candidate.payload));
        candidate.score = candidate.score.scaled(factor);
    }
    sort_by_priority(candidates);
}

fn sort_by_priority(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .priority()
            .partial_cmp(&a.score.priority())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.payload.timestamp.cmp(&a.payload.timestamp))
    });
}

/// The strongest `count` candidates, used as activation seeds.
fn top_candidates(selected: &[Candidate], count: usize) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = selected.to_vec();
    sort_by_priority(&mut ranked);
    ranked.truncate(count);
    ranked
}

/// Dedupe by id (first occurrence wins), sort by resolved priority with
/// a descending-timestamp tie-break, truncate to the budget.
fn merge(candidates: Vec<Candidate>, budget: usize) -> Vec<RetrievedMemory> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if seen.insert(candidate.id) {
            unique.push(candidate);
        }
    }
    sort_by_priority(&mut unique);
    unique.truncate(budget);
    unique.into_iter().map(Candidate::into_memory).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use keepsake_core::types::PointPayload;
    use keepsake_core::MemoryKind;
    use std::collections::BTreeMap;

    fn candidate(score: ScoreKind, hour: u32) -> Candidate {
        Candidate {
            id: Uuid::new_v4(),
            vector: vec![1.0, 0.0],
            payload: PointPayload {
                kind: MemoryKind::Fact,
                timestamp: Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap(),
                source_user: "u1".into(),
                source_context: "c1".into(),
                text_content: "t".into(),
                importance: 3,
                valence: 0.0,
                arousal: 0.2,
                dimensions: BTreeMap::new(),
                triggers: Vec::new(),
            },
            score,
            source: MemorySource::Retrieved,
        }
    }

    #[test]
    fn merge_dedupes_by_id_first_occurrence_wins() {
        let a = candidate(ScoreKind::Rerank(0.9), 10);
        let mut duplicate = candidate(ScoreKind::Similarity(0.1), 11);
        duplicate.id = a.id;
        let b = candidate(ScoreKind::Similarity(0.5), 12);

        let merged = merge(vec![a.clone(), duplicate, b], 10);
        assert_eq!(merged.len(), 2);
        let kept = merged.iter().find(|m| m.id == a.id).unwrap();
        assert_eq!(kept.score, ScoreKind::Rerank(0.9));
    }

    #[test]
    fn merge_sorts_by_priority_then_recency() {
        let high = candidate(ScoreKind::Rerank(0.9), 8);
        let tied_old = candidate(ScoreKind::Similarity(0.5), 9);
        let tied_new = candidate(ScoreKind::Similarity(0.5), 18);
        let unscored = candidate(ScoreKind::Unscored, 23);

        let merged = merge(
            vec![unscored.clone(), tied_old.clone(), high.clone(), tied_new.clone()],
            10,
        );
        assert_eq!(merged[0].id, high.id);
        assert_eq!(merged[1].id, tied_new.id, "recency breaks the tie");
        assert_eq!(merged[2].id, tied_old.id);
        assert_eq!(merged[3].id, unscored.id, "unscored sorts last");
    }

    #[test]
    fn merge_truncates_to_budget() {
        let candidates: Vec<Candidate> = (0..10)
            .map(|n| candidate(ScoreKind::Similarity(n as f32 / 10.0), n as u32))
            .collect();
        let merged = merge(candidates, 3);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn top_candidates_picks_by_priority_without_reordering_input() {
        let low = candidate(ScoreKind::Similarity(0.1), 8);
        let high = candidate(ScoreKind::Rerank(0.9), 9);
        let selected = vec![low.clone(), high.clone()];
        let seeds = top_candidates(&selected, 1);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].id, high.id);
        // Input order untouched.
        assert_eq!(selected[0].id, low.id);
    }
}
