//! Single-flight guard for token refreshes.
//!
//! `Idle` -> first caller becomes the `Leader` and the gate moves to
//! `Refreshing`. Every caller arriving while refreshing gets a `Waiter`
//! receiving the leader's outcome. Finishing the leader drains all waiters
//! and returns the gate to `Idle`. Dropping an unfinished leader (its task
//! was cancelled) also returns the gate to `Idle`, but closes the waiters'
//! channels without an outcome so they can enter again and lead.

use std::sync::Mutex;

use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("token refresh failed: {0}")]
pub struct RefreshFailure(pub String);

/// New bearer token, or why none could be obtained.
pub type RefreshOutcome = Result<String, RefreshFailure>;

enum GateState {
    Idle,
    Refreshing {
        waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    },
}

pub struct RefreshGate {
    state: Mutex<GateState>,
}

pub enum Ticket<'a> {
    /// Caller must perform the refresh and hand the result to `Leader::finish`.
    Leader(Leader<'a>),
    /// A refresh is already running; await its outcome. A closed channel
    /// means the leader was abandoned and the caller should `enter` again.
    Waiter(oneshot::Receiver<RefreshOutcome>),
}

pub struct Leader<'a> {
    gate: &'a RefreshGate,
    finished: bool,
}

impl Leader<'_> {
    /// Publish the outcome to every waiter. Returns how many were waiting.
    pub fn finish(mut self, outcome: &RefreshOutcome) -> usize {
        self.finished = true;
        self.gate.drain(outcome)
    }
}

impl Drop for Leader<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.gate.abandon();
        }
    }
}

impl Default for RefreshGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Idle),
        }
    }

    pub fn enter(&self) -> Ticket<'_> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let GateState::Refreshing { waiters } = &mut *state {
            let (tx, rx) = oneshot::channel();
            waiters.push(tx);
            return Ticket::Waiter(rx);
        }

        *state = GateState::Refreshing { waiters: Vec::new() };
        Ticket::Leader(Leader {
            gate: self,
            finished: false,
        })
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(|e| e.into_inner()),
            GateState::Refreshing { .. }
        )
    }

    fn reset(&self) -> GateState {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *state, GateState::Idle)
    }

    fn abandon(&self) {
        if let GateState::Refreshing { waiters } = self.reset() {
            if !waiters.is_empty() {
                tracing::debug!(waiters = waiters.len(), "refresh leader abandoned, waiters will retry");
            }
        }
    }

    fn drain(&self, outcome: &RefreshOutcome) -> usize {
        let GateState::Refreshing { waiters } = self.reset() else {
            return 0;
        };
        let count = waiters.len();
        for tx in waiters {
            // receiver gone means that caller stopped waiting
            let _ = tx.send(outcome.clone());
        }
        if count > 0 {
            tracing::debug!(waiters = count, ok = outcome.is_ok(), "released refresh waiters");
        }
        count
    }
}
