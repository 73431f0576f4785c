use std::{
    collections::VecDeque,
    sync::{Condvar, Mutex},
    time::Duration,
};

use crate::{
    context::Context,
    errors::{Error, RunResult},
    value::Value,
};

/// How long blocked channel operations sleep between cancellation checks.
/// Sends and receives are notified promptly; the timeout only bounds how
/// late a cancellation is observed.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
struct ChanState {
    queue: VecDeque<Value>,
    closed: bool,
    /// Number of receivers currently blocked; a capacity-0 send hands off
    /// only when one is waiting.
    recv_waiting: usize,
}

/// A FIFO channel with a fixed capacity and a closed flag.
///
/// Send on a full channel and receive on an empty open channel block the
/// calling thread until the operation can proceed or the context is
/// cancelled. Send on a closed channel is an error; receive on a closed
/// channel drains remaining items and then yields nil.
#[derive(Debug)]
pub struct Chan {
    capacity: usize,
    state: Mutex<ChanState>,
    send_ready: Condvar,
    recv_ready: Condvar,
}

impl Chan {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(ChanState {
                queue: VecDeque::new(),
                closed: false,
                recv_waiting: 0,
            }),
            send_ready: Condvar::new(),
            recv_ready: Condvar::new(),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_state().queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_state().queue.is_empty()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ChanState> {
        self.state
            .lock()
            .expect("channel lock poisoned - a thread panicked while holding it")
    }

    /// Sends a value, blocking while the channel is full. Wakes with an
    /// error if the context is cancelled or the channel is closed.
    pub fn send(&self, value: Value, ctx: &Context) -> RunResult<()> {
        let mut state = self.lock_state();
        loop {
            if state.closed {
                return Err(Error::value_error("send on closed channel"));
            }
            let has_room = if self.capacity == 0 {
                state.recv_waiting > 0 && state.queue.is_empty()
            } else {
                state.queue.len() < self.capacity
            };
            if has_room {
                state.queue.push_back(value);
                self.recv_ready.notify_one();
                return Ok(());
            }
            ctx.check()?;
            let (guard, _timeout) = self
                .send_ready
                .wait_timeout(state, POLL_INTERVAL)
                .expect("channel lock poisoned - a thread panicked while holding it");
            state = guard;
        }
    }

    /// Receives a value, blocking while the channel is open and empty. A
    /// closed, drained channel yields nil.
    pub fn recv(&self, ctx: &Context) -> RunResult<Value> {
        let mut state = self.lock_state();
        state.recv_waiting += 1;
        loop {
            if let Some(value) = state.queue.pop_front() {
                state.recv_waiting -= 1;
                self.send_ready.notify_one();
                return Ok(value);
            }
            if state.closed {
                state.recv_waiting -= 1;
                return Ok(Value::Nil);
            }
            if ctx.is_cancelled() {
                state.recv_waiting -= 1;
                return Err(Error::cancelled());
            }
            if self.capacity == 0 {
                // a sender may be waiting for a receiver to show up
                self.send_ready.notify_one();
            }
            let (guard, _timeout) = self
                .recv_ready
                .wait_timeout(state, POLL_INTERVAL)
                .expect("channel lock poisoned - a thread panicked while holding it");
            state = guard;
        }
    }

    pub fn close(&self) -> RunResult<()> {
        let mut state = self.lock_state();
        if state.closed {
            return Err(Error::value_error("close of closed channel"));
        }
        state.closed = true;
        self.send_ready.notify_all();
        self.recv_ready.notify_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn buffered_send_and_recv() {
        let ctx = Context::new();
        let chan = Chan::new(2);
        chan.send(Value::Int(1), &ctx).expect("send");
        chan.send(Value::Int(2), &ctx).expect("send");
        assert_eq!(chan.len(), 2);
        assert_eq!(chan.recv(&ctx).expect("recv"), Value::Int(1));
        assert_eq!(chan.recv(&ctx).expect("recv"), Value::Int(2));
    }

    #[test]
    fn capacity_sends_do_not_block() {
        let ctx = Context::new();
        let chan = Chan::new(3);
        for i in 0..3 {
            chan.send(Value::Int(i), &ctx).expect("send within capacity");
        }
        assert_eq!(chan.len(), 3);
    }

    #[test]
    fn send_on_full_channel_wakes_on_cancel() {
        let ctx = Context::new();
        let chan = Chan::new(1);
        chan.send(Value::Int(1), &ctx).expect("send");
        ctx.cancel();
        let err = chan.send(Value::Int(2), &ctx).expect_err("should cancel");
        assert_eq!(err.to_string(), "cancelled: context cancelled");
    }

    #[test]
    fn closed_channel_drains_then_yields_nil() {
        let ctx = Context::new();
        let chan = Chan::new(1);
        chan.send(Value::Int(7), &ctx).expect("send");
        chan.close().expect("close");
        assert_eq!(chan.recv(&ctx).expect("recv"), Value::Int(7));
        assert_eq!(chan.recv(&ctx).expect("recv"), Value::Nil);
    }

    #[test]
    fn send_on_closed_channel_fails() {
        let ctx = Context::new();
        let chan = Chan::new(1);
        chan.close().expect("close");
        let err = chan.send(Value::Int(1), &ctx).expect_err("should fail");
        assert_eq!(err.to_string(), "value error: send on closed channel");
    }

    #[test]
    fn double_close_fails() {
        let chan = Chan::new(1);
        chan.close().expect("close");
        assert!(chan.close().is_err());
    }

    #[test]
    fn unbuffered_handoff() {
        let ctx = Context::new();
        let chan = Arc::new(Chan::new(0));
        let chan2 = Arc::clone(&chan);
        let ctx2 = ctx.child();
        let receiver = std::thread::spawn(move || chan2.recv(&ctx2));
        chan.send(Value::Int(42), &ctx).expect("send");
        let received = receiver.join().expect("join").expect("recv");
        assert_eq!(received, Value::Int(42));
    }

    #[test]
    fn fifo_order_is_preserved() {
        let ctx = Context::new();
        let chan = Chan::new(8);
        for i in 0..8 {
            chan.send(Value::Int(i), &ctx).expect("send");
        }
        for i in 0..8 {
            assert_eq!(chan.recv(&ctx).expect("recv"), Value::Int(i));
        }
    }
}
