// Copyright 2026 The Streamsieve Project
// SPDX-License-Identifier: Apache-2.0

// Match decisions and the handler seam.
//
// Handlers are injected into the stream core the same way validators are
// injected into a proxy pipeline: a small Send + Sync trait, with the
// concrete policy living entirely on the caller's side.

use std::sync::Arc;

use crate::history::History;

/// Error type a handler may return. Surfaced as `SieveError::CallbackFailure`.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// What to do with a matched keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Emit the matched keyword as-is.
    Pass,
    /// Remove the matched keyword from the output.
    Drop,
    /// Remove the match and emit the payload instead (may be empty).
    /// The replacement is emitted directly; it is not re-scanned.
    Replace(String),
    /// Emit the match, then terminate the stream.
    Halt,
    /// Enter segment-drop mode. The marker itself is swallowed.
    ContinueDrop,
    /// Leave segment-drop mode. The marker itself is emitted.
    ContinuePass,
}

impl Decision {
    pub fn is_halt(&self) -> bool {
        matches!(self, Decision::Halt)
    }
}

/// Context handed to a handler when its keyword matches.
///
/// The buffer view is valid only for the duration of the call; at dispatch
/// time it contains exactly the matched span.
pub struct MatchContext<'a> {
    /// The matched keyword.
    pub keyword: &'a str,
    /// Read-only view of the currently buffered characters.
    pub buffer: &'a [char],
    /// 1-based end position of the match within the input stream.
    pub absolute_pos: usize,
    /// The processor's history substrate.
    pub history: &'a dyn History,
}

/// Decides what happens to a matched keyword.
///
/// Handlers bound to the same keyword run in registration order; the last
/// decision wins, except that any `Halt` reply forces `Halt`.
pub trait MatchHandler: Send + Sync {
    fn on_match(&self, ctx: &MatchContext<'_>) -> Result<Decision, HandlerError>;
}

/// Constructors for the common handlers, named after what they decide.
pub mod handlers {
    use super::*;

    struct Static(Decision);

    impl MatchHandler for Static {
        fn on_match(&self, _ctx: &MatchContext<'_>) -> Result<Decision, HandlerError> {
            Ok(self.0.clone())
        }
    }

    struct FnHandler<F>(F);

    impl<F> MatchHandler for FnHandler<F>
    where
        F: for<'a> Fn(&MatchContext<'a>) -> Result<Decision, HandlerError> + Send + Sync,
    {
        fn on_match(&self, ctx: &MatchContext<'_>) -> Result<Decision, HandlerError> {
            (self.0)(ctx)
        }
    }

    /// Leave the matched keyword in place.
    pub fn passthrough() -> Arc<dyn MatchHandler> {
        Arc::new(Static(Decision::Pass))
    }

    /// Drop the matched keyword.
    pub fn drop() -> Arc<dyn MatchHandler> {
        Arc::new(Static(Decision::Drop))
    }

    /// Replace the matched keyword with `text`.
    pub fn replace(text: impl Into<String>) -> Arc<dyn MatchHandler> {
        Arc::new(Static(Decision::Replace(text.into())))
    }

    /// Emit the match, then terminate the stream.
    pub fn halt() -> Arc<dyn MatchHandler> {
        Arc::new(Static(Decision::Halt))
    }

    /// Start dropping all subsequent stream content (until a
    /// `ContinuePass` match re-opens it).
    pub fn continuous_drop() -> Arc<dyn MatchHandler> {
        Arc::new(Static(Decision::ContinueDrop))
    }

    /// Resume passing stream content after a drop segment.
    pub fn continuous_pass() -> Arc<dyn MatchHandler> {
        Arc::new(Static(Decision::ContinuePass))
    }

    /// Wrap a closure as a handler, for decisions that depend on context.
    pub fn from_fn<F>(f: F) -> Arc<dyn MatchHandler>
    where
        F: for<'a> Fn(&MatchContext<'a>) -> Result<Decision, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(FnHandler(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::NullHistory;

    fn ctx<'a>(history: &'a dyn History, buffer: &'a [char]) -> MatchContext<'a> {
        MatchContext {
            keyword: "kw",
            buffer,
            absolute_pos: 2,
            history,
        }
    }

    #[test]
    fn static_handlers_return_their_decision() {
        let hist = NullHistory;
        let buf = ['k', 'w'];
        let c = ctx(&hist, &buf);

        assert_eq!(handlers::passthrough().on_match(&c).unwrap(), Decision::Pass);
        assert_eq!(handlers::drop().on_match(&c).unwrap(), Decision::Drop);
        assert_eq!(
            handlers::replace("x").on_match(&c).unwrap(),
            Decision::Replace("x".to_string())
        );
        assert!(handlers::halt().on_match(&c).unwrap().is_halt());
    }

    #[test]
    fn from_fn_sees_the_context() {
        let hist = NullHistory;
        let buf = ['k', 'w'];
        let c = ctx(&hist, &buf);

        let handler = handlers::from_fn(|ctx: &MatchContext<'_>| {
            Ok(Decision::Replace(format!("<{}@{}>", ctx.keyword, ctx.absolute_pos)))
        });
        assert_eq!(
            handler.on_match(&c).unwrap(),
            Decision::Replace("<kw@2>".to_string())
        );
    }
}
