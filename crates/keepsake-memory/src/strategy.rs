// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval strategy selection.

/// How the pipeline sources its primary candidates for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrategy {
    /// Similarity search plus reranking; for contexts where exact
    /// recall matters more than recency.
    Precise,
    /// Recency scan of the current context; the default.
    Recent,
}

/// Context-tag prefixes that demand precision-first retrieval.
const PRECISE_PREFIXES: &[&str] = &["work", "info", "research", "question", "philosophy", "advice"];

/// Pure, total mapping from a context tag to a retrieval strategy.
///
/// Every tag maps: unrecognized tags (and empty ones) default to
/// [`RetrievalStrategy::Recent`].
pub fn select_strategy(context_tag: &str) -> RetrievalStrategy {
    if PRECISE_PREFIXES
        .iter()
        .any(|prefix| context_tag.starts_with(prefix))
    {
        RetrievalStrategy::Precise
    } else {
        RetrievalStrategy::Recent
    }
}
