//! Cancellation contexts threaded through evaluation.
//!
//! A [`Context`] carries a chain of cancellation tokens. The VM checks the
//! context before each opcode dispatch and unwinds with a cancellation error
//! (still running defers) once it fires; blocking channel and thread
//! operations also wake on cancellation.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::errors::{Error, RunResult};

/// A cancellation token. Child tokens observe their parent's cancellation.
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
    parent: Option<Arc<CancelToken>>,
}

impl CancelToken {
    fn child_of(parent: Arc<CancelToken>) -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            parent: Some(parent),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            return true;
        }
        self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }
}

/// An immutable context object passed into evaluation, carrying the
/// cancellation token chain.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: Arc<CancelToken>,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A child context that is cancelled when either it or this context is
    /// cancelled. Spawned threads run under a child context.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: Arc::new(CancelToken::child_of(Arc::clone(&self.token))),
        }
    }

    #[must_use]
    pub fn token(&self) -> Arc<CancelToken> {
        Arc::clone(&self.token)
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns the cancellation error if this context has been cancelled.
    pub fn check(&self) -> RunResult<()> {
        if self.is_cancelled() {
            Err(Error::cancelled())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_observes_parent_cancellation() {
        let parent = Context::new();
        let child = parent.child();
        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn parent_ignores_child_cancellation() {
        let parent = Context::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }
}
