// Copyright 2026 The Streamsieve Project
// SPDX-License-Identifier: Apache-2.0

// Output re-packing.
//
// The processor emits characters in per-feed batches; the re-packer
// reshapes each batch into the caller's preferred yield shape. It is
// stateless per call and never interprets content.

use std::str::FromStr;

use crate::error::SieveError;

/// How the adapter groups output characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldMode {
    /// One yield per output character.
    Char,
    /// One yield per upstream token feed (empty output suppressed).
    Token,
    /// Fixed-width pieces of N chars; the batch remainder is yielded as a
    /// final short piece.
    Chunk(usize),
}

impl FromStr for YieldMode {
    type Err = SieveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "char" => Ok(YieldMode::Char),
            "token" => Ok(YieldMode::Token),
            _ => {
                if let Some(n) = s.strip_prefix("chunk:") {
                    let size: usize = n.parse().map_err(|_| {
                        SieveError::InvalidConfiguration(format!(
                            "invalid chunk size in yield mode '{s}'"
                        ))
                    })?;
                    YieldMode::Chunk(size).validate()?;
                    Ok(YieldMode::Chunk(size))
                } else {
                    Err(SieveError::InvalidConfiguration(format!(
                        "unknown yield mode '{s}'"
                    )))
                }
            }
        }
    }
}

impl YieldMode {
    pub(crate) fn validate(self) -> Result<(), SieveError> {
        if let YieldMode::Chunk(0) = self {
            return Err(SieveError::InvalidConfiguration(
                "chunk size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reshapes one batch of emitted characters. Construction validates the
/// mode, so `repack` itself cannot fail.
#[derive(Clone, Debug)]
pub struct Repacker {
    mode: YieldMode,
}

impl Repacker {
    pub fn new(mode: YieldMode) -> Result<Self, SieveError> {
        mode.validate()?;
        Ok(Repacker { mode })
    }

    /// Split `batch` into pieces according to the yield mode. An empty
    /// batch always produces no pieces.
    pub fn repack(&self, batch: &str) -> Vec<String> {
        if batch.is_empty() {
            return Vec::new();
        }
        match self.mode {
            YieldMode::Char => batch.chars().map(String::from).collect(),
            YieldMode::Token => vec![batch.to_string()],
            YieldMode::Chunk(size) => {
                let chars: Vec<char> = batch.chars().collect();
                chars
                    .chunks(size)
                    .map(|piece| piece.iter().collect())
                    .collect()
            }
        }
    }
}
