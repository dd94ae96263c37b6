// Copyright 2026 The Streamsieve Project
// SPDX-License-Identifier: Apache-2.0

// Keyword registry.
//
// Owns the (keyword, handler) binding table and the compiled automaton.
// Mutation marks the registry dirty; `compile` rebuilds lazily. Streams
// never hold the registry itself -- they capture a `RegistrySnapshot` at
// construction, so mutating the registry mid-stream is safe and does not
// affect in-flight processors.

use std::collections::HashMap;
use std::sync::Arc;

use crate::action::MatchHandler;
use crate::automaton::Automaton;
use crate::error::SieveError;

struct Binding {
    keyword: String,
    handler: Arc<dyn MatchHandler>,
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("keyword", &self.keyword)
            .finish()
    }
}

/// Immutable handle to a compiled automaton, cheap to clone and freely
/// shareable across threads for read.
#[derive(Clone, Debug)]
pub struct RegistrySnapshot {
    automaton: Arc<Automaton>,
}

impl RegistrySnapshot {
    /// Char length of the longest keyword in the snapshot (0 if empty).
    pub fn max_len(&self) -> usize {
        self.automaton.max_len()
    }

    pub(crate) fn automaton(&self) -> &Arc<Automaton> {
        &self.automaton
    }
}

#[derive(Default, Debug)]
pub struct KeywordRegistry {
    /// All bindings in registration order.
    bindings: Vec<Binding>,
    /// Compiled automaton; `None` means dirty.
    compiled: Option<RegistrySnapshot>,
}

impl KeywordRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `keyword`. Handlers for the same keyword run in
    /// registration order on match.
    pub fn register(
        &mut self,
        keyword: impl Into<String>,
        handler: Arc<dyn MatchHandler>,
    ) -> Result<(), SieveError> {
        let keyword = keyword.into();
        if keyword.is_empty() {
            return Err(SieveError::InvalidKeyword);
        }
        self.bindings.push(Binding { keyword, handler });
        self.compiled = None;
        Ok(())
    }

    /// Remove the first binding whose keyword equals `keyword` and whose
    /// handler is the same allocation as `handler`. No-op if absent.
    pub fn deregister(&mut self, keyword: &str, handler: &Arc<dyn MatchHandler>) {
        let found = self
            .bindings
            .iter()
            .position(|b| b.keyword == keyword && Arc::ptr_eq(&b.handler, handler));
        if let Some(idx) = found {
            self.bindings.remove(idx);
            self.compiled = None;
        }
    }

    /// Remove every binding for `keyword`. No-op if absent.
    pub fn deregister_all(&mut self, keyword: &str) {
        let before = self.bindings.len();
        self.bindings.retain(|b| b.keyword != keyword);
        if self.bindings.len() != before {
            self.compiled = None;
        }
    }

    /// Rebuild the automaton if dirty. Safe to call repeatedly.
    pub fn compile(&mut self) {
        if self.compiled.is_some() {
            return;
        }

        // Merge bindings per keyword, preserving first-registration order
        // for keywords and registration order for handlers.
        let mut order: Vec<String> = Vec::new();
        let mut merged: HashMap<String, Vec<Arc<dyn MatchHandler>>> = HashMap::new();
        for binding in &self.bindings {
            let entry = merged.entry(binding.keyword.clone()).or_insert_with(|| {
                order.push(binding.keyword.clone());
                Vec::new()
            });
            entry.push(Arc::clone(&binding.handler));
        }

        let specs: Vec<(String, Vec<Arc<dyn MatchHandler>>)> = order
            .into_iter()
            .map(|kw| {
                let handlers = merged.remove(&kw).unwrap_or_default();
                (kw, handlers)
            })
            .collect();

        self.compiled = Some(RegistrySnapshot {
            automaton: Arc::new(Automaton::build(specs)),
        });
    }

    /// Char length of the longest registered keyword (0 if empty).
    pub fn max_len(&self) -> usize {
        self.bindings
            .iter()
            .map(|b| b.keyword.chars().count())
            .max()
            .unwrap_or(0)
    }

    /// Compile if dirty and return an immutable handle for a stream to
    /// hold. Later registry mutations do not affect the snapshot.
    pub fn snapshot(&mut self) -> RegistrySnapshot {
        self.compile();
        self.compiled
            .clone()
            .expect("compile always populates the snapshot")
    }
}
