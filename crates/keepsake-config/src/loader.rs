// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./keepsake.toml` > `~/.config/keepsake/keepsake.toml`
//! > `/etc/keepsake/keepsake.toml` with environment variable overrides via
//! the `KEEPSAKE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::KeepsakeConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/keepsake/keepsake.toml` (system-wide)
/// 3. `~/.config/keepsake/keepsake.toml` (user XDG config)
/// 4. `./keepsake.toml` (local directory)
/// 5. `KEEPSAKE_*` environment variables
pub fn load_config() -> Result<KeepsakeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KeepsakeConfig::default()))
        .merge(Toml::file("/etc/keepsake/keepsake.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("keepsake/keepsake.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("keepsake.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<KeepsakeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KeepsakeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<KeepsakeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KeepsakeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `KEEPSAKE_STM_WINDOW_SIZE` must map
/// to `stm.window_size`, not `stm.window.size`.
fn env_provider() -> Env {
    Env::prefixed("KEEPSAKE_").map(|key| {
        // `key` is the lowercased env var name with the prefix stripped,
        // e.g. KEEPSAKE_RETRIEVAL_PROMPT_BUDGET -> "retrieval_prompt_budget".
        let mapped = key
            .as_str()
            .replacen("storage_", "storage.", 1)
            .replacen("stm_", "stm.", 1)
            .replacen("cas_", "cas.", 1)
            .replacen("ingestion_", "ingestion.", 1)
            .replacen("retrieval_", "retrieval.", 1)
            .replacen("activation_", "activation.", 1)
            .replacen("temporal_", "temporal.", 1)
            .replacen("relationship_", "relationship.", 1);
        mapped.into()
    })
}
