// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classifier adapter trait for scoring raw messages into memory payloads.

use async_trait::async_trait;

use crate::error::KeepsakeError;
use crate::types::Classification;

/// Adapter for the external message classifier.
///
/// Turns raw message text into a typed, scored, emotionally annotated
/// classification. Failure is expected and non-fatal: the ingestion
/// worker degrades to [`Classification::unknown`].
///
/// [`Classification::unknown`]: crate::types::Classification::unknown
#[async_trait]
pub trait ClassifierAdapter: Send + Sync {
    /// Classifies one message's text.
    async fn classify(&self, text: &str) -> Result<Classification, KeepsakeError>;
}
