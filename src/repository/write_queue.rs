//! FIFO write queue for one collection key
//!
//! A queue grants one turn at a time. `acquire` either takes the idle queue
//! (setting `running`) or appends a completion signal to `waiting` and sleeps
//! until the previous holder hands its turn over. Dropping a [`QueueTurn`]
//! passes the turn to the oldest live waiter, or clears `running`.
//!
//! Cancellation is safe in both directions: a waiter dropped before its turn
//! arrives is skipped, and a turn delivered to a waiter that is then dropped is
//! released on drop like any other.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct QueueState {
    running: bool,
    waiting: VecDeque<oneshot::Sender<QueueTurn>>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<QueueState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive right to write a collection; released on drop
#[derive(Debug)]
#[must_use = "the turn is released as soon as it is dropped"]
pub struct QueueTurn {
    shared: Option<Arc<Shared>>,
}

impl Drop for QueueTurn {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            release(&shared);
        }
    }
}

fn release(shared: &Arc<Shared>) {
    loop {
        let next = {
            let mut state = shared.lock();
            match state.waiting.pop_front() {
                Some(next) => next,
                None => {
                    state.running = false;
                    return;
                }
            }
        };

        match next.send(QueueTurn {
            shared: Some(shared.clone()),
        }) {
            Ok(()) => return,
            // Waiter gave up; disarm the bounced turn and try the next one.
            Err(mut bounced) => {
                bounced.shared = None;
            }
        }
    }
}

/// Strict FIFO, one-at-a-time queue. Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct WriteQueue {
    shared: Arc<Shared>,
}

impl WriteQueue {
    /// Create an idle queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for this caller's turn
    pub async fn acquire(&self) -> QueueTurn {
        let waiter = {
            let mut state = self.shared.lock();
            if state.running {
                let (tx, rx) = oneshot::channel();
                state.waiting.push_back(tx);
                Some(rx)
            } else {
                state.running = true;
                None
            }
        };

        match waiter {
            None => QueueTurn {
                shared: Some(self.shared.clone()),
            },
            Some(rx) => match rx.await {
                Ok(turn) => turn,
                // Senders are consumed only by `release`, which always sends.
                Err(_) => QueueTurn {
                    shared: Some(self.shared.clone()),
                },
            },
        }
    }

    /// Run `op` inside a turn
    pub async fn run<F, Fut, T>(&self, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let _turn = self.acquire().await;
        op().await
    }

    /// Whether a turn is currently held
    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Callers waiting for a turn
    pub fn pending(&self) -> usize {
        self.shared.lock().waiting.len()
    }
}
