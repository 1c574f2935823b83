//! Host readiness.
//!
//! Every binding node awaits this before wiring listeners, so hydration never
//! races the host's own startup. Readiness is one-way: once ready, always
//! ready.

use std::cell::RefCell;

use futures::channel::oneshot;
use spark_signals::{Signal, signal};

pub struct ReadyState {
    ready: Signal<bool>,
    waiters: RefCell<Vec<oneshot::Sender<()>>>,
}

impl Default for ReadyState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadyState {
    pub fn new() -> Self {
        Self {
            ready: signal(false),
            waiters: RefCell::new(Vec::new()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.get()
    }

    /// The reactive readiness flag.
    pub fn signal(&self) -> Signal<bool> {
        self.ready.clone()
    }

    /// Flip to ready and release every waiter. Idempotent.
    pub fn mark_ready(&self) {
        if self.is_ready() {
            return;
        }
        self.ready.set(true);
        let waiters = std::mem::take(&mut *self.waiters.borrow_mut());
        tracing::debug!(waiters = waiters.len(), "environment ready");
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }

    /// Resolve once the environment is ready.
    pub async fn wait(&self) {
        if self.is_ready() {
            return;
        }
        let (tx, rx) = oneshot::channel();
        self.waiters.borrow_mut().push(tx);
        let _ = rx.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[test]
    fn test_wait_resolves_after_mark() {
        let ready = ReadyState::new();
        let mut waiter = Box::pin(ready.wait());
        assert!((&mut waiter).now_or_never().is_none());

        ready.mark_ready();
        assert!(waiter.now_or_never().is_some());
        assert!(ready.wait().now_or_never().is_some());
    }
}
