//! Cooperative Cancellation
//!
//! Cancellation tokens and sources used by [`Scope`](crate::scope::Scope) to
//! tear down sibling work once a computation short-circuits.
//!
//! # Design
//!
//! Cancellation is cooperative: child work checks its token at convenient
//! points (loop heads, before blocking) and returns early once it is set.
//! Tokens form a tree. A token is cancelled when its own source is, or when
//! any ancestor is, so cancelling an outer scope reaches every nested one.
//!
//! The token of the innermost running scope is tracked per thread, which is
//! how a scope opened inside a child task finds its parent.
//!
//! # Example
//!
//! ```rust,ignore
//! use kont_runtime::cancellation::CancellationSource;
//!
//! let source = CancellationSource::new();
//! let token = source.token();
//!
//! std::thread::spawn(move || {
//!     while !token.is_cancelled() {
//!         // Do work...
//!     }
//! });
//!
//! source.cancel();
//! ```

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Counter for generating unique cancellation token IDs.
static TOKEN_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Shared state for cancellation tokens.
#[derive(Debug)]
struct CancellationState {
    /// Whether cancellation has been requested.
    cancelled: AtomicBool,
    /// Parent token (for hierarchical cancellation).
    parent: Option<CancellationToken>,
    /// Reason and timestamp, set once on cancellation.
    detail: Mutex<Option<(Option<String>, Instant)>>,
    /// Wakes threads blocked in `wait`.
    notify: Condvar,
}

/// A read-only view of a cancellation flag.
///
/// Tokens are cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    id: u64,
    state: Arc<CancellationState>,
}

impl CancellationToken {
    fn new(parent: Option<CancellationToken>) -> Self {
        Self {
            id: TOKEN_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            state: Arc::new(CancellationState {
                cancelled: AtomicBool::new(false),
                parent,
                detail: Mutex::new(None),
                notify: Condvar::new(),
            }),
        }
    }

    /// Get the token ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Check if cancellation has been requested here or on any ancestor.
    pub fn is_cancelled(&self) -> bool {
        if self.state.cancelled.load(Ordering::Acquire) {
            return true;
        }
        match &self.state.parent {
            Some(parent) => parent.is_cancelled(),
            None => false,
        }
    }

    /// Get the cancellation reason, searching ancestors when this token was
    /// cancelled through its parent.
    pub fn reason(&self) -> Option<String> {
        if let Some((reason, _)) = self.state.detail.lock().as_ref() {
            return reason.clone();
        }
        self.state.parent.as_ref().and_then(|p| p.reason())
    }

    /// Get the time when cancellation was requested on this token.
    pub fn cancelled_at(&self) -> Option<Instant> {
        self.state.detail.lock().as_ref().map(|(_, at)| *at)
    }

    /// Block until cancellation is requested or `timeout` expires.
    ///
    /// Returns true if cancelled. Cancellation of an ancestor is noticed at
    /// the latest after a short polling interval.
    pub fn wait(&self, timeout: Duration) -> bool {
        const POLL: Duration = Duration::from_millis(5);

        let deadline = Instant::now() + timeout;
        let mut detail = self.state.detail.lock();
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let step = (deadline - now).min(POLL);
            self.state.notify.wait_for(&mut detail, step);
        }
    }

    /// Create a child token, cancelled with this one.
    pub fn child(&self) -> CancellationSource {
        CancellationSource::with_parent(self.clone())
    }

    /// Return an error if cancelled.
    pub fn check(&self) -> Result<(), CancellationError> {
        if self.is_cancelled() {
            Err(CancellationError {
                reason: self.reason(),
            })
        } else {
            Ok(())
        }
    }
}

/// Owns the ability to cancel its token.
#[derive(Debug)]
pub struct CancellationSource {
    token: CancellationToken,
}

impl CancellationSource {
    /// Create a root source.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(None),
        }
    }

    /// Create a source whose token is also cancelled by `parent`.
    pub fn with_parent(parent: CancellationToken) -> Self {
        Self {
            token: CancellationToken::new(Some(parent)),
        }
    }

    /// Get a token from this source.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel all tokens from this source.
    pub fn cancel(&self) {
        self.cancel_with_reason(None);
    }

    /// Cancel all tokens with a reason. Only the first cancellation is recorded.
    pub fn cancel_with_reason(&self, reason: Option<String>) {
        let state = &self.token.state;
        let mut detail = state.detail.lock();
        if detail.is_none() {
            *detail = Some((reason, Instant::now()));
        }
        state.cancelled.store(true, Ordering::Release);
        state.notify.notify_all();
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Error returned when an operation is cancelled.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("operation cancelled{}", .reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
pub struct CancellationError {
    /// The cancellation reason, if provided.
    pub reason: Option<String>,
}

thread_local! {
    static CURRENT: RefCell<Option<CancellationToken>> = const { RefCell::new(None) };
}

/// Token of the innermost scope running on this thread, if any.
pub fn current_token() -> Option<CancellationToken> {
    CURRENT.with(|c| c.borrow().clone())
}

/// Makes `token` the current token until dropped, then restores the previous one.
#[derive(Debug)]
pub(crate) struct CurrentTokenGuard {
    previous: Option<CancellationToken>,
}

impl CurrentTokenGuard {
    pub(crate) fn enter(token: CancellationToken) -> Self {
        let previous = CURRENT.with(|c| c.borrow_mut().replace(token));
        Self { previous }
    }
}

impl Drop for CurrentTokenGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|c| *c.borrow_mut() = previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_source_basic() {
        let source = CancellationSource::new();
        let token = source.token();

        assert!(!token.is_cancelled());
        source.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancellation_with_reason() {
        let source = CancellationSource::new();
        let token = source.token();

        source.cancel_with_reason(Some("shifted".into()));
        assert_eq!(token.reason(), Some("shifted".into()));
        assert!(token.cancelled_at().is_some());
    }

    #[test]
    fn test_first_reason_wins() {
        let source = CancellationSource::new();
        source.cancel_with_reason(Some("first".into()));
        source.cancel_with_reason(Some("second".into()));
        assert_eq!(source.token().reason(), Some("first".into()));
    }

    #[test]
    fn test_hierarchical_cancellation() {
        let parent = CancellationSource::new();
        let child = parent.token().child();
        let grandchild = child.token().child();

        assert!(!grandchild.is_cancelled());
        parent.cancel_with_reason(Some("outer".into()));
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
        assert_eq!(grandchild.token().reason(), Some("outer".into()));
    }

    #[test]
    fn test_child_cancellation_independent() {
        let parent = CancellationSource::new();
        let child = parent.token().child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_token_check() {
        let source = CancellationSource::new();
        let token = source.token();

        assert!(token.check().is_ok());
        source.cancel();
        assert_eq!(token.check(), Err(CancellationError { reason: None }));
    }

    #[test]
    fn test_wait_wakes_on_cancel() {
        let source = CancellationSource::new();
        let token = source.token();
        let waiter = std::thread::spawn(move || token.wait(Duration::from_secs(5)));
        std::thread::sleep(Duration::from_millis(20));
        source.cancel();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_wait_observes_parent() {
        let parent = CancellationSource::new();
        let child = parent.token().child();
        let token = child.token();
        let waiter = std::thread::spawn(move || token.wait(Duration::from_secs(5)));
        std::thread::sleep(Duration::from_millis(20));
        parent.cancel();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_wait_timeout() {
        let source = CancellationSource::new();
        assert!(!source.token().wait(Duration::from_millis(10)));
    }

    #[test]
    fn test_current_token_guard_nests() {
        assert!(current_token().is_none());
        let outer = CancellationSource::new();
        let inner = CancellationSource::new();
        {
            let _outer = CurrentTokenGuard::enter(outer.token());
            assert_eq!(current_token().map(|t| t.id()), Some(outer.token().id()));
            {
                let _inner = CurrentTokenGuard::enter(inner.token());
                assert_eq!(current_token().map(|t| t.id()), Some(inner.token().id()));
            }
            assert_eq!(current_token().map(|t| t.id()), Some(outer.token().id()));
        }
        assert!(current_token().is_none());
    }

    #[test]
    fn test_cancellation_error_display() {
        let err = CancellationError { reason: None };
        assert_eq!(err.to_string(), "operation cancelled");

        let err = CancellationError {
            reason: Some("timeout".into()),
        };
        assert_eq!(err.to_string(), "operation cancelled: timeout");
    }
}
