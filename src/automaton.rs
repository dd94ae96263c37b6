// Copyright 2026 The Streamsieve Project
// SPDX-License-Identifier: Apache-2.0

// Aho-Corasick automaton over the registered keyword set.
//
// Nodes live in an arena and refer to each other by index. Output sets are
// materialized at build time so per-character traversal never walks the
// failure chain for reporting: a node's output lists every pattern ending
// at it or at any node on its failure chain, longest first.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::action::MatchHandler;

pub(crate) const ROOT: u32 = 0;

/// One compiled keyword with its handlers merged in registration order.
pub(crate) struct Pattern {
    pub keyword: String,
    /// Keyword length in chars (the span it occupies in the buffer).
    pub char_len: usize,
    pub handlers: Vec<Arc<dyn MatchHandler>>,
}

impl std::fmt::Debug for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pattern")
            .field("keyword", &self.keyword)
            .field("char_len", &self.char_len)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[derive(Debug)]
struct Node {
    children: HashMap<char, u32>,
    fail: u32,
    /// Pattern ids, sorted by descending char length, ties by
    /// registration order.
    output: Vec<u32>,
}

impl Node {
    fn new() -> Self {
        Node {
            children: HashMap::new(),
            fail: ROOT,
            output: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Automaton {
    nodes: Vec<Node>,
    patterns: Vec<Pattern>,
    max_len: usize,
}

impl Automaton {
    /// Build the trie, failure links, and output sets.
    ///
    /// `specs` is one entry per distinct keyword, in first-registration
    /// order, handlers already merged in registration order.
    pub fn build(specs: Vec<(String, Vec<Arc<dyn MatchHandler>>)>) -> Self {
        let mut nodes = vec![Node::new()];
        let mut patterns = Vec::with_capacity(specs.len());
        let mut max_len = 0;

        for (keyword, handlers) in specs {
            let char_len = keyword.chars().count();
            max_len = max_len.max(char_len);
            let pid = patterns.len() as u32;

            let mut node = ROOT;
            for ch in keyword.chars() {
                node = match nodes[node as usize].children.get(&ch) {
                    Some(&next) => next,
                    None => {
                        let next = nodes.len() as u32;
                        nodes.push(Node::new());
                        nodes[node as usize].children.insert(ch, next);
                        next
                    }
                };
            }
            nodes[node as usize].output.push(pid);

            patterns.push(Pattern {
                keyword,
                char_len,
                handlers,
            });
        }

        // BFS failure links. Root's children fail to root; every other node
        // reached by `ch` from parent `p` fails to the node reached by
        // following p's fail chain on `ch`, or root.
        let mut queue: VecDeque<u32> = VecDeque::new();
        let first_level: Vec<u32> = nodes[ROOT as usize].children.values().copied().collect();
        for child in first_level {
            nodes[child as usize].fail = ROOT;
            queue.push_back(child);
        }

        while let Some(current) = queue.pop_front() {
            let children: Vec<(char, u32)> = nodes[current as usize]
                .children
                .iter()
                .map(|(&ch, &id)| (ch, id))
                .collect();
            for (ch, child) in children {
                let mut f = nodes[current as usize].fail;
                let fail = loop {
                    if let Some(&next) = nodes[f as usize].children.get(&ch) {
                        break next;
                    }
                    if f == ROOT {
                        break ROOT;
                    }
                    f = nodes[f as usize].fail;
                };
                nodes[child as usize].fail = fail;

                // Merge the failure node's output (already complete, BFS
                // visits it first), then order longest-first.
                let merged: Vec<u32> = nodes[fail as usize].output.clone();
                let out = &mut nodes[child as usize].output;
                out.extend(merged);
                out.sort_by_key(|&pid| {
                    (std::cmp::Reverse(patterns[pid as usize].char_len), pid)
                });
                out.dedup();

                queue.push_back(child);
            }
        }

        tracing::debug!(
            patterns = patterns.len(),
            nodes = nodes.len(),
            max_len,
            "keyword automaton compiled"
        );

        Automaton {
            nodes,
            patterns,
            max_len,
        }
    }

    /// Advance from `from` on `ch`, following failure links on mismatch.
    pub fn step(&self, from: u32, ch: char) -> u32 {
        let mut node = from;
        loop {
            if let Some(&next) = self.nodes[node as usize].children.get(&ch) {
                return next;
            }
            if node == ROOT {
                return ROOT;
            }
            node = self.nodes[node as usize].fail;
        }
    }

    /// The longest pattern reported at `node`, if any.
    pub fn longest_match(&self, node: u32) -> Option<u32> {
        self.nodes[node as usize].output.first().copied()
    }

    pub fn pattern(&self, id: u32) -> &Pattern {
        &self.patterns[id as usize]
    }

    /// Char length of the longest keyword (the buffer bound `L`).
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}
