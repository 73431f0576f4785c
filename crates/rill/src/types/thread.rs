use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex,
    },
    time::Duration,
};

use crate::{
    context::{CancelToken, Context},
    errors::RunResult,
    value::Value,
};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Handle to a running script thread: a one-shot result slot plus the
/// thread's cancellation token, which is derived from the spawning context.
#[derive(Debug)]
pub struct ThreadHandle {
    result: Mutex<Option<RunResult<Value>>>,
    completed: Condvar,
    done: AtomicBool,
    token: Arc<CancelToken>,
}

impl ThreadHandle {
    #[must_use]
    pub fn new(token: Arc<CancelToken>) -> Self {
        Self {
            result: Mutex::new(None),
            completed: Condvar::new(),
            done: AtomicBool::new(false),
            token,
        }
    }

    /// Stores the thread's result. Called exactly once, by the spawned
    /// thread itself.
    pub fn complete(&self, result: RunResult<Value>) {
        let mut slot = self
            .result
            .lock()
            .expect("thread result lock poisoned - a thread panicked while holding it");
        *slot = Some(result);
        self.done.store(true, Ordering::Release);
        self.completed.notify_all();
    }

    /// Blocks until the thread finishes and returns its result. A raised
    /// error from the thread body (including cancellation) surfaces here.
    pub fn wait(&self, ctx: &Context) -> RunResult<Value> {
        let mut slot = self
            .result
            .lock()
            .expect("thread result lock poisoned - a thread panicked while holding it");
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            ctx.check()?;
            let (guard, _timeout) = self
                .completed
                .wait_timeout(slot, POLL_INTERVAL)
                .expect("thread result lock poisoned - a thread panicked while holding it");
            slot = guard;
        }
    }

    /// Requests cancellation of the thread's context.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Non-blocking completion check.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}
