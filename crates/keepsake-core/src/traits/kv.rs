// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Versioned KV store trait: the optimistic-concurrency seam shared by
//! the conversation window and the relationship store.

use async_trait::async_trait;

use crate::error::KeepsakeError;

/// Namespace for short-term conversation window records.
pub const STM_NAMESPACE: &str = "stm";

/// Namespace for relationship state records.
pub const RELATIONSHIP_NAMESPACE: &str = "relationship";

/// Version token reported for an absent key. A conditional write against
/// this token creates the record at version 1.
pub const ABSENT_VERSION: u64 = 0;

/// A KV store whose records carry a monotonically increasing version
/// token, supporting compare-and-swap writes.
///
/// This is the only synchronization primitive in the system: there is no
/// global lock, and all cross-writer consistency is per-key CAS.
#[async_trait]
pub trait VersionedKvStore: Send + Sync {
    /// Reads a record, returning its body and current version token.
    /// Absent keys return `(None, ABSENT_VERSION)`.
    async fn read(
        &self,
        ns: &str,
        key: &str,
    ) -> Result<(Option<serde_json::Value>, u64), KeepsakeError>;

    /// Conditionally writes `body` if the stored version still equals
    /// `expected`, storing the record at `expected + 1`.
    ///
    /// Returns `false` (leaving the record untouched) when the token is
    /// stale; a concurrent writer committed first and the caller must
    /// re-read before retrying.
    async fn write_if(
        &self,
        ns: &str,
        key: &str,
        body: serde_json::Value,
        expected: u64,
    ) -> Result<bool, KeepsakeError>;
}
