// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Keepsake memory engine.
//!
//! Provides the two stores the engine depends on:
//!
//! - **SqlitePointStore**: the insert-only memory point collection, with
//!   BLOB vector storage, in-process cosine scoring, and recency scans.
//! - **SqliteKvStore**: versioned records with compare-and-swap writes,
//!   backing the conversation window and the relationship engine.
//!
//! Both share one [`Database`] connection; tokio-rusqlite serializes all
//! access on a single background thread, which is what makes the KV
//! conditional write atomic.

pub mod database;
pub mod kv;
pub mod migrations;
pub mod points;

pub use database::Database;
pub use kv::SqliteKvStore;
pub use points::SqlitePointStore;
