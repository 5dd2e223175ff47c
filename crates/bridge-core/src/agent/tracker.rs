//! In-flight action bookkeeping with drain notification.
//!
//! The set's emptiness is the sole predicate: `await_drain` resolves as soon
//! as no action is running, and every waiter pending at that transition is
//! woken by the same drain event.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, oneshot};

/// Opaque handle for one action invocation. Two concurrent invocations of the
/// same action name hold distinct tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionToken(u64);

#[derive(Default)]
struct Inner {
    running: HashSet<ActionToken>,
    waiters: Vec<oneshot::Sender<()>>,
}

#[derive(Default)]
pub struct InFlightTracker {
    inner: Mutex<Inner>,
    next_token: AtomicU64,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh token for one action invocation.
    pub fn token(&self) -> ActionToken {
        ActionToken(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    /// Adds a token to the running set. Re-tracking the same token is a no-op,
    /// so an invocation can never be counted twice.
    pub async fn track(&self, token: ActionToken) {
        self.inner.lock().await.running.insert(token);
    }

    /// Removes a token. When the set becomes empty as a result, every pending
    /// waiter is woken exactly once and the waiter list is cleared.
    pub async fn release(&self, token: ActionToken) {
        let mut inner = self.inner.lock().await;
        if inner.running.remove(&token) && inner.running.is_empty() {
            for waiter in inner.waiters.drain(..) {
                // A waiter that gave up is fine to skip.
                let _ = waiter.send(());
            }
        }
    }

    /// Resolves immediately when nothing is running, otherwise suspends until
    /// the next drain event.
    pub async fn await_drain(&self) {
        let rx = {
            let mut inner = self.inner.lock().await;
            if inner.running.is_empty() {
                return;
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.push(tx);
            rx
        };
        // The sender only disappears if the tracker itself is torn down;
        // either way there is nothing left to wait for.
        let _ = rx.await;
    }

    pub async fn in_flight(&self) -> usize {
        self.inner.lock().await.running.len()
    }
}
