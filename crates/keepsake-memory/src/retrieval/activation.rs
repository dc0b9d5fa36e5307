// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph spreading activation over an on-demand memory network.
//!
//! The "graph" is never persisted: edges are discovered per hop by
//! similarity search, and a neighbour is linked when its cosine clears
//! the similarity threshold or it shares a trigger keyword with its
//! parent. Activation starts at 1.0 on the seeds and is attenuated by
//! the per-hop decay and the edge weight; nodes that fall below the
//! activation floor are neither kept nor expanded, which is what keeps
//! the traversal bounded in practice along with the depth cap.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use keepsake_config::model::ActivationConfig;
use keepsake_core::{KeepsakeError, MemorySource, PointStore, ScoreKind, SearchRequest};
use uuid::Uuid;

use super::Candidate;

/// One frontier entry: where to expand from and with how much energy.
struct FrontierNode {
    vector: Vec<f32>,
    triggers: Vec<String>,
    activation: f32,
}

/// Breadth-first spreading activation from `seeds`.
///
/// `visited` carries the ids already selected by earlier stages; they
/// are excluded from expansion results so only novel memories are
/// returned, tagged [`MemorySource::Activated`].
pub(crate) async fn spread(
    points: &Arc<dyn PointStore>,
    seeds: &[Candidate],
    visited: &HashSet<Uuid>,
    config: &ActivationConfig,
    store_timeout: Duration,
) -> Result<Vec<Candidate>, KeepsakeError> {
    let mut visited = visited.clone();
    let mut activated = Vec::new();

    let mut frontier: Vec<FrontierNode> = seeds
        .iter()
        .take(config.max_seeds)
        .map(|seed| FrontierNode {
            vector: seed.vector.clone(),
            triggers: seed.payload.triggers.clone(),
            activation: 1.0,
        })
        .collect();

    for _depth in 0..config.max_depth {
        let mut next_frontier = Vec::new();

        for node in &frontier {
            let request = SearchRequest {
                vector: node.vector.clone(),
                limit: config.neighbor_limit,
                exclude: visited.iter().copied().collect(),
                ..SearchRequest::default()
            };
            let neighbours = tokio::time::timeout(store_timeout, points.search(request))
                .await
                .map_err(|_| KeepsakeError::Timeout {
                    duration: store_timeout,
                })??;

            for neighbour in neighbours {
                let trigger_link = shares_trigger(&node.triggers, &neighbour.payload.triggers);
                if neighbour.score < config.similarity_threshold && !trigger_link {
                    continue;
                }
                let edge_weight = if trigger_link {
                    neighbour.score.max(config.trigger_weight)
                } else {
                    neighbour.score
                };
                let activation = node.activation * config.hop_decay * edge_weight;
                if activation < config.activation_floor {
                    continue;
                }
                if !visited.insert(neighbour.id) {
                    continue;
                }

                next_frontier.push(FrontierNode {
                    vector: neighbour.vector.clone(),
                    triggers: neighbour.payload.triggers.clone(),
                    activation,
                });
                activated.push(Candidate {
                    id: neighbour.id,
                    vector: neighbour.vector,
                    payload: neighbour.payload,
                    score: ScoreKind::Activation(activation),
                    source: MemorySource::Activated,
                });
            }
        }

        if next_frontier.is_empty() {
            break;
        }
        frontier = next_frontier;
    }

    Ok(activated)
}

/// Whether two trigger sets share a keyword (case-insensitive).
fn shares_trigger(a: &[String], b: &[String]) -> bool {
    a.iter()
        .any(|ta| b.iter().any(|tb| ta.eq_ignore_ascii_case(tb)))
}
