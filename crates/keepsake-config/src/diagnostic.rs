// SPDX-FileCopyrightText: 2026 Keepsake Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Diagnostic error types for configuration loading and validation.
//!
//! Figment deserialization failures and post-deserialization validation
//! findings are both rendered as miette diagnostics so the embedding
//! application can print them uniformly.

use miette::Diagnostic;
use thiserror::Error;

/// A configuration error suitable for diagnostic rendering.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The TOML failed to deserialize (unknown key, type mismatch,
    /// malformed syntax). Carries figment's message verbatim.
    #[error("configuration could not be parsed: {message}")]
    #[diagnostic(
        code(keepsake::config::parse),
        help("check key spelling and value types against the documented sections")
    )]
    Parse {
        /// Figment's rendered error message.
        message: String,
    },

    /// A value deserialized fine but violates a semantic constraint.
    #[error("invalid configuration value: {message}")]
    #[diagnostic(code(keepsake::config::validation))]
    Validation {
        /// Description of the violated constraint.
        message: String,
    },
}

/// Convert a figment extraction error into diagnostics, one per
/// underlying failure.
pub fn figment_to_config_errors(err: figment::Error) -> Vec<ConfigError> {
    err.into_iter()
        .map(|e| ConfigError::Parse {
            message: e.to_string(),
        })
        .collect()
}

/// Render a list of config errors into a printable report.
pub fn render_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| format!("{e}"))
        .collect::<Vec<_>>()
        .join("\n")
}
