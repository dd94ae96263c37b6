// Copyright 2026 The Streamsieve Project
// SPDX-License-Identifier: Apache-2.0

/// All errors surfaced by the registry, config layer, and stream core.
#[derive(Debug, thiserror::Error)]
pub enum SieveError {
    /// Registration was attempted with an empty keyword.
    #[error("invalid keyword: keywords must be non-empty")]
    InvalidKeyword,

    /// A construction option was rejected (e.g. `chunk:0`).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A match handler returned an error. The stream is halted; no further
    /// input is accepted.
    #[error("callback failed on keyword '{keyword}' at position {pos}: {reason}")]
    CallbackFailure {
        keyword: String,
        pos: usize,
        reason: String,
    },

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to read config source: {0}")]
    Io(#[from] std::io::Error),
}
