// Copyright 2026 The Streamsieve Project
// SPDX-License-Identifier: Apache-2.0

// Producer adapters.
//
// Wrap an upstream producer of string tokens and drive the synchronous
// core: feed each character into the processor, hand each token's
// emissions to the re-packer, flush at producer end. Two entry points --
// a plain iterator and a tokio stream -- both with the same semantics.
// After a halt no further tokens are pulled from the producer.

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

use crate::error::SieveError;
use crate::filter::StreamProcessor;
use crate::history::HistoryMode;
use crate::registry::RegistrySnapshot;
use crate::repack::{Repacker, YieldMode};

/// Builds filtered views of token producers against one registry snapshot.
#[derive(Debug)]
pub struct SieveAdapter {
    snapshot: RegistrySnapshot,
    repacker: Repacker,
    history: HistoryMode,
}

impl SieveAdapter {
    /// Create an adapter. Fails with `InvalidConfiguration` for `chunk:0`.
    pub fn new(snapshot: RegistrySnapshot, yield_mode: YieldMode) -> Result<Self, SieveError> {
        Ok(SieveAdapter {
            snapshot,
            repacker: Repacker::new(yield_mode)?,
            history: HistoryMode::Recording,
        })
    }

    /// Choose the history substrate for streams built by this adapter.
    pub fn with_history(mut self, mode: HistoryMode) -> Self {
        self.history = mode;
        self
    }

    /// Filter a synchronous token iterator.
    pub fn filter_iter<I>(&self, tokens: I) -> FilteredTokens<I::IntoIter>
    where
        I: IntoIterator<Item = String>,
    {
        FilteredTokens {
            tokens: tokens.into_iter(),
            processor: StreamProcessor::new(self.snapshot.clone(), self.history),
            repacker: self.repacker.clone(),
            pending: VecDeque::new(),
            error: None,
            done: false,
        }
    }

    /// Filter a suspension-capable token source.
    ///
    /// The producer is polled from a spawned task; output arrives through
    /// a bounded channel. On halt or handler failure the task stops
    /// pulling tokens and ends the output stream.
    pub fn filter_stream(
        &self,
        mut tokens: impl Stream<Item = String> + Unpin + Send + 'static,
    ) -> impl Stream<Item = Result<String, SieveError>> {
        let mut processor = StreamProcessor::new(self.snapshot.clone(), self.history);
        let repacker = self.repacker.clone();
        let (tx, rx) = mpsc::channel::<Result<String, SieveError>>(64);

        tokio::spawn(async move {
            while let Some(token) = tokens.next().await {
                let mut batch = String::new();
                let mut halted = false;
                let mut failure: Option<SieveError> = None;

                for ch in token.chars() {
                    match processor.process(ch) {
                        Ok(step) => {
                            batch.push_str(&step.emitted);
                            if step.halted {
                                halted = true;
                                break;
                            }
                        }
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }

                // Emissions committed for characters before a halt or
                // failure still reach the consumer.
                for piece in repacker.repack(&batch) {
                    if tx.send(Ok(piece)).await.is_err() {
                        return; // client disconnected
                    }
                }
                if let Some(e) = failure {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
                if halted {
                    tracing::debug!("halt committed; ending output stream");
                    return;
                }
            }

            let tail = processor.flush();
            for piece in repacker.repack(&tail) {
                if tx.send(Ok(piece)).await.is_err() {
                    return;
                }
            }
        });

        ReceiverStream::new(rx)
    }
}

/// Iterator returned by [`SieveAdapter::filter_iter`].
pub struct FilteredTokens<I> {
    tokens: I,
    processor: StreamProcessor,
    repacker: Repacker,
    pending: VecDeque<String>,
    error: Option<SieveError>,
    done: bool,
}

impl<I> FilteredTokens<I> {
    /// The underlying processor, e.g. to inspect history after the run.
    pub fn processor(&self) -> &StreamProcessor {
        &self.processor
    }
}

impl<I: Iterator<Item = String>> Iterator for FilteredTokens<I> {
    type Item = Result<String, SieveError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(piece) = self.pending.pop_front() {
                return Some(Ok(piece));
            }
            if let Some(err) = self.error.take() {
                self.done = true;
                return Some(Err(err));
            }
            if self.done {
                return None;
            }

            match self.tokens.next() {
                Some(token) => {
                    let mut batch = String::new();
                    for ch in token.chars() {
                        match self.processor.process(ch) {
                            Ok(step) => {
                                batch.push_str(&step.emitted);
                                if step.halted {
                                    self.done = true;
                                    break;
                                }
                            }
                            Err(e) => {
                                self.error = Some(e);
                                break;
                            }
                        }
                    }
                    self.pending.extend(self.repacker.repack(&batch));
                }
                None => {
                    let tail = self.processor.flush();
                    self.pending.extend(self.repacker.repack(&tail));
                    self.done = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::handlers;
    use crate::registry::KeywordRegistry;

    fn snapshot(rules: Vec<(&str, std::sync::Arc<dyn crate::action::MatchHandler>)>) -> RegistrySnapshot {
        let mut reg = KeywordRegistry::new();
        for (kw, handler) in rules {
            reg.register(kw, handler).unwrap();
        }
        reg.snapshot()
    }

    fn tokens(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn iter_adapter_token_mode_groups_per_token() {
        let snap = snapshot(vec![("secret", handlers::replace("[R]"))]);
        let adapter = SieveAdapter::new(snap, YieldMode::Token).unwrap();

        let out: Vec<String> = adapter
            .filter_iter(tokens(&["My ", "secret", " data."]))
            .collect::<Result<_, _>>()
            .unwrap();

        // The last token's tail is held for prefix safety and arrives
        // with the producer-end flush.
        assert_eq!(out.concat(), "My [R] data.");
    }

    #[test]
    fn iter_adapter_matches_across_token_boundaries() {
        let snap = snapshot(vec![("secret", handlers::drop())]);
        let adapter = SieveAdapter::new(snap, YieldMode::Token).unwrap();

        let out: Vec<String> = adapter
            .filter_iter(tokens(&["a sec", "ret b"]))
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(out.concat(), "a  b");
    }

    #[test]
    fn iter_adapter_stops_pulling_after_halt() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulled);
        let producer = tokens(&["a", "stop", "never"]).into_iter().map(move |t| {
            counter.fetch_add(1, Ordering::SeqCst);
            t
        });

        let snap = snapshot(vec![("stop", handlers::halt())]);
        let adapter = SieveAdapter::new(snap, YieldMode::Token).unwrap();

        let out: Vec<String> = adapter
            .filter_iter(producer)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(out.concat(), "astop");
        assert_eq!(pulled.load(Ordering::SeqCst), 2, "\"never\" must not be pulled");
    }

    #[test]
    fn iter_adapter_surfaces_handler_failure_after_committed_output() {
        use crate::action::MatchContext;

        let mut reg = KeywordRegistry::new();
        reg.register("ok", handlers::replace("OK")).unwrap();
        reg.register(
            "bad",
            handlers::from_fn(|_ctx: &MatchContext<'_>| Err("boom".into())),
        )
        .unwrap();

        let adapter = SieveAdapter::new(reg.snapshot(), YieldMode::Token).unwrap();
        let results: Vec<Result<String, SieveError>> =
            adapter.filter_iter(tokens(&["ok then bad end"])).collect();

        let (oks, errs): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
        let emitted: String = oks.into_iter().map(Result::unwrap).collect();
        // Everything committed for characters before the failing match
        // still reaches the consumer; "end" never does.
        assert_eq!(emitted, "OK then");
        assert_eq!(errs.len(), 1);
        assert!(matches!(
            errs[0].as_ref().unwrap_err(),
            SieveError::CallbackFailure { .. }
        ));
    }

    #[test]
    fn chunk_zero_is_rejected_at_adapter_construction() {
        let snap = snapshot(vec![("x", handlers::drop())]);
        let err = SieveAdapter::new(snap, YieldMode::Chunk(0)).unwrap_err();
        assert!(matches!(err, SieveError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn stream_adapter_filters_and_flushes() {
        let snap = snapshot(vec![("secret", handlers::replace("[R]"))]);
        let adapter = SieveAdapter::new(snap, YieldMode::Token).unwrap();

        let input = tokio_stream::iter(tokens(&["My secret", " data."]));
        let mut output = adapter.filter_stream(input);

        let mut collected = String::new();
        while let Some(piece) = output.next().await {
            collected.push_str(&piece.unwrap());
        }
        assert_eq!(collected, "My [R] data.");
    }

    #[tokio::test]
    async fn stream_adapter_ends_cleanly_on_halt() {
        let snap = snapshot(vec![("stop", handlers::halt())]);
        let adapter = SieveAdapter::new(snap, YieldMode::Char).unwrap();

        let input = tokio_stream::iter(tokens(&["ab", "stop", "xyz"]));
        let mut output = adapter.filter_stream(input);

        let mut collected = String::new();
        while let Some(piece) = output.next().await {
            collected.push_str(&piece.unwrap());
        }
        // The halting match is emitted, then the stream ends; no sentinel
        // and nothing from "xyz".
        assert_eq!(collected, "abstop");
    }

    #[tokio::test]
    async fn stream_adapter_surfaces_handler_failure() {
        use crate::action::MatchContext;

        let mut reg = KeywordRegistry::new();
        reg.register(
            "bad",
            handlers::from_fn(|_ctx: &MatchContext<'_>| Err("boom".into())),
        )
        .unwrap();

        let adapter = SieveAdapter::new(reg.snapshot(), YieldMode::Token).unwrap();
        let input = tokio_stream::iter(tokens(&["a bad b"]));
        let mut output = adapter.filter_stream(input);

        let mut saw_error = false;
        let mut collected = String::new();
        while let Some(piece) = output.next().await {
            match piece {
                Ok(s) => collected.push_str(&s),
                Err(e) => {
                    assert!(matches!(e, SieveError::CallbackFailure { .. }));
                    saw_error = true;
                }
            }
        }
        assert!(saw_error);
        assert_eq!(collected, "a");
        // Nothing after the error: the task returned.
    }
}
