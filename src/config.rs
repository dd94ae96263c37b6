// Copyright 2026 The Streamsieve Project
// SPDX-License-Identifier: Apache-2.0

// YAML rule configuration.
//
// Lets a deployment declare its keyword rules without writing handlers:
//
// ```yaml
// rules:
//   - keyword: "secret"
//     action: replace
//     with: "[REDACTED]"
//   - keyword: "<thought>"
//     action: continue_drop
// yield_mode: "chunk:8"
// record_history: false
// ```
//
// Only the static decisions are expressible here; context-dependent
// handlers are registered programmatically.

use std::path::PathBuf;

use serde::Deserialize;

use crate::action::handlers;
use crate::error::SieveError;
use crate::history::HistoryMode;
use crate::registry::KeywordRegistry;
use crate::repack::YieldMode;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Abstraction over where config YAML comes from.
///
/// `FileSource` reads from disk; `StringSource` provides content directly
/// (used in tests to avoid file I/O).
pub trait ConfigSource {
    fn load(&self) -> Result<String, SieveError>;
}

/// Loads config from a file on disk.
pub struct FileSource {
    pub path: PathBuf,
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<String, SieveError> {
        Ok(std::fs::read_to_string(&self.path)?)
    }
}

/// Provides config content directly as a string.
pub struct StringSource {
    pub content: String,
}

impl ConfigSource for StringSource {
    fn load(&self) -> Result<String, SieveError> {
        Ok(self.content.clone())
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SieveConfig {
    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    /// Yield mode string: "char", "token", or "chunk:N".
    #[serde(default = "default_yield_mode")]
    pub yield_mode: String,

    #[serde(default = "default_record_history")]
    pub record_history: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    pub keyword: String,
    #[serde(flatten)]
    pub action: RuleAction,
}

/// Static decision a rule applies to its keyword.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RuleAction {
    Pass,
    Drop,
    Replace { with: String },
    Halt,
    ContinueDrop,
    ContinuePass,
}

fn default_yield_mode() -> String {
    "token".to_string()
}

fn default_record_history() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Loading and building
// ---------------------------------------------------------------------------

/// Load and parse config from a source.
pub fn load_config(source: &dyn ConfigSource) -> Result<SieveConfig, SieveError> {
    let content = source.load()?;
    let config: SieveConfig = serde_yaml::from_str(&content)?;
    tracing::debug!(
        rules = config.rules.len(),
        yield_mode = %config.yield_mode,
        "sieve config loaded"
    );
    Ok(config)
}

impl SieveConfig {
    /// Build a registry with one handler per rule, in rule order.
    pub fn build_registry(&self) -> Result<KeywordRegistry, SieveError> {
        let mut registry = KeywordRegistry::new();
        for rule in &self.rules {
            let handler = match &rule.action {
                RuleAction::Pass => handlers::passthrough(),
                RuleAction::Drop => handlers::drop(),
                RuleAction::Replace { with } => handlers::replace(with.clone()),
                RuleAction::Halt => handlers::halt(),
                RuleAction::ContinueDrop => handlers::continuous_drop(),
                RuleAction::ContinuePass => handlers::continuous_pass(),
            };
            registry.register(rule.keyword.clone(), handler)?;
        }
        Ok(registry)
    }

    /// Parse the configured yield mode.
    pub fn yield_mode(&self) -> Result<YieldMode, SieveError> {
        self.yield_mode.parse()
    }

    pub fn history_mode(&self) -> HistoryMode {
        if self.record_history {
            HistoryMode::Recording
        } else {
            HistoryMode::Disabled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(yaml: &str) -> Result<SieveConfig, SieveError> {
        load_config(&StringSource {
            content: yaml.to_string(),
        })
    }

    const FULL_YAML: &str = r#"
rules:
  - keyword: "secret"
    action: replace
    with: "[REDACTED]"
  - keyword: "stop"
    action: halt
  - keyword: "<thought>"
    action: continue_drop
  - keyword: "</thought>"
    action: continue_pass
yield_mode: "chunk:8"
record_history: false
"#;

    #[test]
    fn full_config_parses() {
        let config = load(FULL_YAML).unwrap();
        assert_eq!(config.rules.len(), 4);
        assert_eq!(config.yield_mode().unwrap(), YieldMode::Chunk(8));
        assert_eq!(config.history_mode(), HistoryMode::Disabled);
        assert!(matches!(
            config.rules[0].action,
            RuleAction::Replace { ref with } if with == "[REDACTED]"
        ));
    }

    #[test]
    fn defaults_apply_when_fields_are_omitted() {
        let config = load("rules: []").unwrap();
        assert!(config.rules.is_empty());
        assert_eq!(config.yield_mode().unwrap(), YieldMode::Token);
        assert_eq!(config.history_mode(), HistoryMode::Recording);
    }

    #[test]
    fn built_registry_carries_the_rules() {
        let config = load(FULL_YAML).unwrap();
        let mut registry = config.build_registry().unwrap();
        assert_eq!(registry.max_len(), 10);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.max_len(), 10);
    }

    #[test]
    fn empty_keyword_in_rules_is_rejected() {
        let config = load(
            r#"
rules:
  - keyword: ""
    action: drop
"#,
        )
        .unwrap();
        let err = config.build_registry().unwrap_err();
        assert!(matches!(err, SieveError::InvalidKeyword));
    }

    #[test]
    fn bad_yield_mode_is_rejected() {
        let config = load("yield_mode: \"chunk:0\"").unwrap();
        assert!(matches!(
            config.yield_mode().unwrap_err(),
            SieveError::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn unknown_action_fails_to_parse() {
        let result = load(
            r#"
rules:
  - keyword: "x"
    action: explode
"#,
        );
        assert!(matches!(result.unwrap_err(), SieveError::Yaml(_)));
    }

    #[test]
    fn replace_requires_its_payload() {
        let result = load(
            r#"
rules:
  - keyword: "x"
    action: replace
"#,
        );
        assert!(result.is_err());
    }
}
