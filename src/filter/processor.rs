// Stream processor.
//
// Takes an input character stream, matches it against the snapshot's
// keyword automaton, and produces output characters lazily: a character
// leaves the buffer only once it provably cannot belong to a future
// match, or a match decision has committed it.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::action::{Decision, MatchContext};
use crate::automaton::{Pattern, ROOT};
use crate::error::SieveError;
use crate::history::{self, ActionOutcome, ActionRecord, History, HistoryMode};
use crate::registry::RegistrySnapshot;

/// Output of a single `process` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    /// Characters committed downstream by this step, in order.
    pub emitted: String,
    /// True once a `Halt` decision has committed; the caller must stop
    /// feeding input and end its output stream.
    pub halted: bool,
}

/// Processes a character stream against one registry snapshot.
///
/// A processor is strictly single-threaded: each character is handled to
/// completion before the next. The snapshot is captured at construction,
/// so registry mutations never affect an in-flight stream.
pub struct StreamProcessor {
    snapshot: RegistrySnapshot,
    node: u32,
    /// Unresolved tail of the input: neither emitted nor discarded yet.
    /// Never longer than the longest keyword between steps.
    buffer: VecDeque<char>,
    /// Count of input characters consumed (1-based for callbacks).
    pos: usize,
    /// While set, emission is suppressed; matching still runs so a
    /// `ContinuePass` match can re-open the stream.
    segment_drop: bool,
    halted: bool,
    history: Box<dyn History>,
}

impl StreamProcessor {
    pub fn new(snapshot: RegistrySnapshot, mode: HistoryMode) -> Self {
        StreamProcessor {
            snapshot,
            node: ROOT,
            buffer: VecDeque::new(),
            pos: 0,
            segment_drop: false,
            halted: false,
            history: history::for_mode(mode),
        }
    }

    /// Process one character, returning everything that became safe to
    /// emit. Errors only when a match handler fails; the stream is then
    /// halted and accepts no further input.
    pub fn process(&mut self, ch: char) -> Result<StepOutput, SieveError> {
        if self.halted {
            return Ok(StepOutput {
                emitted: String::new(),
                halted: true,
            });
        }

        let automaton = Arc::clone(self.snapshot.automaton());

        self.history.record_input(ch);
        self.pos += 1;

        // Fast path: no keywords registered, pure pass-through.
        if automaton.max_len() == 0 {
            self.history.record_output(ch);
            return Ok(StepOutput {
                emitted: ch.to_string(),
                halted: false,
            });
        }

        self.buffer.push_back(ch);
        self.node = automaton.step(self.node, ch);

        let mut out = String::new();
        let mut halted_now = false;

        if let Some(pid) = automaton.longest_match(self.node) {
            let pattern = automaton.pattern(pid);

            // Pre-match flush: everything strictly left of the match span
            // is now resolved and leaves the buffer.
            while self.buffer.len() > pattern.char_len {
                if let Some(c) = self.buffer.pop_front() {
                    if !self.segment_drop {
                        out.push(c);
                    }
                }
            }

            let decision = self.dispatch(pattern)?;

            // The buffer now holds exactly the matched span. Toggles flip
            // the segment flag first, then the emission rule applies under
            // the new flag.
            match &decision {
                Decision::Pass => {
                    let emit = !self.segment_drop;
                    for c in self.buffer.drain(..) {
                        if emit {
                            out.push(c);
                        }
                    }
                }
                Decision::Drop => {
                    self.buffer.clear();
                }
                Decision::Replace(text) => {
                    self.buffer.clear();
                    if !self.segment_drop {
                        out.push_str(text);
                    }
                }
                Decision::Halt => {
                    let emit = !self.segment_drop;
                    for c in self.buffer.drain(..) {
                        if emit {
                            out.push(c);
                        }
                    }
                    self.halted = true;
                    halted_now = true;
                    tracing::debug!(keyword = %pattern.keyword, pos = self.pos, "stream halted");
                }
                Decision::ContinueDrop => {
                    self.segment_drop = true;
                    self.buffer.clear();
                }
                Decision::ContinuePass => {
                    self.segment_drop = false;
                    for c in self.buffer.drain(..) {
                        out.push(c);
                    }
                }
            }

            tracing::trace!(keyword = %pattern.keyword, pos = self.pos, ?decision, "match committed");
            self.history.record_action(ActionRecord {
                pos: self.pos,
                keyword: pattern.keyword.clone(),
                outcome: ActionOutcome::Committed(decision),
            });

            // The match is consumed; anchoring resumes on later characters.
            self.node = ROOT;
        }

        // Lazy flush: the leftmost character is provably not part of any
        // future match once the buffer exceeds the longest keyword.
        while self.buffer.len() > automaton.max_len() {
            if let Some(c) = self.buffer.pop_front() {
                if !self.segment_drop {
                    out.push(c);
                }
            }
        }

        for c in out.chars() {
            self.history.record_output(c);
        }
        Ok(StepOutput {
            emitted: out,
            halted: halted_now,
        })
    }

    /// Run every handler bound to the winning pattern, in registration
    /// order, and resolve their replies: last decision wins, any `Halt`
    /// forces `Halt`.
    fn dispatch(&mut self, pattern: &Pattern) -> Result<Decision, SieveError> {
        let span: Vec<char> = self.buffer.iter().copied().collect();
        let mut resolved: Option<Decision> = None;
        let mut halt_seen = false;
        let mut failure: Option<String> = None;

        {
            let ctx = MatchContext {
                keyword: &pattern.keyword,
                buffer: &span,
                absolute_pos: self.pos,
                history: &*self.history,
            };
            for handler in &pattern.handlers {
                match handler.on_match(&ctx) {
                    Ok(decision) => {
                        if decision.is_halt() {
                            halt_seen = true;
                        }
                        resolved = Some(decision);
                    }
                    Err(e) => {
                        failure = Some(e.to_string());
                        break;
                    }
                }
            }
        }

        if let Some(reason) = failure {
            self.halted = true;
            tracing::warn!(
                keyword = %pattern.keyword,
                pos = self.pos,
                %reason,
                "match handler failed; halting stream"
            );
            self.history.record_action(ActionRecord {
                pos: self.pos,
                keyword: pattern.keyword.clone(),
                outcome: ActionOutcome::Failed {
                    reason: reason.clone(),
                },
            });
            return Err(SieveError::CallbackFailure {
                keyword: pattern.keyword.clone(),
                pos: self.pos,
                reason,
            });
        }

        if halt_seen {
            return Ok(Decision::Halt);
        }
        Ok(resolved.unwrap_or(Decision::Pass))
    }

    /// Emit (or, in segment-drop mode, discard) everything still buffered.
    /// Idempotent; returns empty after a halt.
    pub fn flush(&mut self) -> String {
        if self.halted {
            self.buffer.clear();
            return String::new();
        }

        let mut out = String::new();
        let emit = !self.segment_drop;
        for c in self.buffer.drain(..) {
            if emit {
                out.push(c);
            }
        }
        for c in out.chars() {
            self.history.record_output(c);
        }
        out
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Read-only view of the processor's history substrate.
    pub fn history(&self) -> &dyn History {
        &*self.history
    }
}
