//! The short-circuit signal and per-activation frame state.
//!
//! A `shift` never carries its payload up the stack. The payload is stashed
//! in the owning [`Frame`] under a fresh ticket, and only the small, untyped
//! [`Shifted`] signal travels outward through `?`. The frame whose token
//! matches claims the payload by ticket; every other frame passes the signal
//! on unchanged. This lets a signal cross scopes with unrelated payload types.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use parking_lot::Mutex;
use thiserror::Error;

use crate::token::{next_token, Token};

/// Signal that a computation shifted away from the scope owning `token`.
///
/// The signal is move-only: it is consumed by the single frame it belongs
/// to, or dropped (which abandons the shift).
#[derive(Debug, Error, PartialEq, Eq)]
#[error("shifted continuation ({token})")]
#[must_use = "a shift only takes effect once the signal reaches its owning scope"]
pub struct Shifted {
    token: Token,
    ticket: u64,
}

impl Shifted {
    /// Token of the scope this signal belongs to.
    pub fn token(&self) -> Token {
        self.token
    }

    /// Check whether this signal belongs to the scope owning `token`.
    pub fn belongs_to(&self, token: Token) -> bool {
        self.token == token
    }
}

/// Lifecycle of one interpreter activation.
///
/// `Running` and `Suspended` are the only states that may transition. The
/// other three are terminal, and once a frame is terminal its token is inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScopeState {
    /// Executing the body.
    Running = 0,
    /// The body is awaiting an asynchronous result.
    Suspended = 1,
    /// The body returned normally.
    Completed = 2,
    /// A shift owned by this scope was intercepted.
    ShortCircuited = 3,
    /// The body panicked, was cancelled, or propagated a foreign shift.
    Failed = 4,
}

impl ScopeState {
    /// Returns true for `Completed`, `ShortCircuited` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScopeState::Completed | ScopeState::ShortCircuited | ScopeState::Failed
        )
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => ScopeState::Running,
            1 => ScopeState::Suspended,
            2 => ScopeState::Completed,
            3 => ScopeState::ShortCircuited,
            _ => ScopeState::Failed,
        }
    }
}

impl fmt::Display for ScopeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScopeState::Running => "running",
            ScopeState::Suspended => "suspended",
            ScopeState::Completed => "completed",
            ScopeState::ShortCircuited => "short-circuited",
            ScopeState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// State of one interpreter activation.
pub(crate) struct Frame<R> {
    token: Token,
    state: AtomicU8,
    next_ticket: AtomicU64,
    /// Stashed shift payloads, keyed by ticket. Guarded together with
    /// terminal transitions so a stash can never land in a finished frame.
    pending: Mutex<Vec<(u64, R)>>,
}

impl<R> Frame<R> {
    pub(crate) fn new() -> Self {
        Self {
            token: next_token(),
            state: AtomicU8::new(ScopeState::Running as u8),
            next_ticket: AtomicU64::new(0),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn token(&self) -> Token {
        self.token
    }

    pub(crate) fn state(&self) -> ScopeState {
        ScopeState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Stash `payload` and produce the signal that will claim it.
    ///
    /// # Panics
    /// Panics if the frame already reached a terminal state.
    pub(crate) fn stash(&self, payload: R) -> Shifted {
        let mut pending = self.pending.lock();
        let state = self.state();
        if state.is_terminal() {
            panic!("shift on {} after its scope {}", self.token, state);
        }
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        pending.push((ticket, payload));
        Shifted {
            token: self.token,
            ticket,
        }
    }

    /// Run `f` if nothing was stashed yet, holding off concurrent stashes
    /// until it returns.
    pub(crate) fn unless_shifted<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        let _pending = self.pending.lock();
        if self.next_ticket.load(Ordering::Relaxed) > 0 {
            return None;
        }
        Some(f())
    }

    /// Mark the body as awaiting. No-op unless running.
    pub(crate) fn suspend(&self) {
        let _ = self.state.compare_exchange(
            ScopeState::Running as u8,
            ScopeState::Suspended as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Mark the body as executing again. No-op unless suspended.
    pub(crate) fn resume(&self) {
        let _ = self.state.compare_exchange(
            ScopeState::Suspended as u8,
            ScopeState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Move to a terminal state, dropping every unclaimed payload.
    ///
    /// # Panics
    /// Panics if the frame is already terminal.
    pub(crate) fn finish(&self, terminal: ScopeState) {
        let mut pending = self.pending.lock();
        self.transition(terminal);
        pending.clear();
    }

    /// Like [`finish`](Self::finish) but tolerates an already terminal frame.
    pub(crate) fn abandon(&self) {
        let mut pending = self.pending.lock();
        if !self.state().is_terminal() {
            self.transition(ScopeState::Failed);
        }
        pending.clear();
    }

    /// Claim the payload stashed for `signal` and short-circuit the frame.
    ///
    /// Payloads of other shifts under the same token (race losers, or shifts
    /// the body chose to ignore) are dropped.
    ///
    /// # Panics
    /// Panics if `signal` belongs to another frame or its payload is gone.
    pub(crate) fn claim(&self, signal: Shifted) -> R {
        assert!(
            signal.belongs_to(self.token),
            "{} cannot claim a signal for {}",
            self.token,
            signal.token
        );
        let mut pending = self.pending.lock();
        let index = pending
            .iter()
            .position(|(ticket, _)| *ticket == signal.ticket)
            .unwrap_or_else(|| {
                panic!("no payload stashed for ticket {} of {}", signal.ticket, self.token)
            });
        let (_, payload) = pending.swap_remove(index);
        let losers = pending.len();
        pending.clear();
        self.transition(ScopeState::ShortCircuited);
        drop(pending);

        if losers > 0 {
            tracing::debug!(token = %self.token, losers, "dropped unclaimed shifts");
        }
        payload
    }

    fn transition(&self, terminal: ScopeState) {
        debug_assert!(terminal.is_terminal());
        let previous = self.state.swap(terminal as u8, Ordering::AcqRel);
        let previous = ScopeState::from_u8(previous);
        if previous.is_terminal() {
            panic!(
                "{} completed twice: {} then {}",
                self.token, previous, terminal
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}

impl<R> fmt::Debug for Frame<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("token", &self.token)
            .field("state", &self.state())
            .finish()
    }
}
