// Copyright 2026 The Streamsieve Project
// SPDX-License-Identifier: Apache-2.0

// Streaming keyword filter core.
//
// Responsibilities:
// - Consume one input character at a time, emit zero or more characters
// - Hold back at most `max keyword length` characters (prefix safety:
//   nothing that might still become a match is released)
// - Detect keyword matches via the compiled Aho-Corasick automaton
// - Dispatch match handlers and apply the resolved decision
// - Maintain the continuous drop/pass segment flag and the halt latch

mod processor;

pub use processor::{StepOutput, StreamProcessor};
