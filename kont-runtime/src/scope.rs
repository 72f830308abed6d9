//! # Structured Concurrency
//!
//! A [`Scope`] lets a computation body run sibling tasks that share its
//! [`ContEffect`](crate::effect::ContEffect). Children run on scoped OS
//! threads and can never outlive the scope that spawned them.
//!
//! ## Short-Circuit Semantics
//!
//! - A child that returns `Err(Shifted)` (or panics) cancels the scope's
//!   cancellation token at once, so siblings can stop cooperatively.
//! - When the body returns, every child that was not joined explicitly is
//!   joined. Nothing is detached.
//! - Exactly one result surfaces. A panic (the body's first, then the
//!   leftmost child's) is resumed. Otherwise a shift returned by the body
//!   wins, even over a child shift that arrived earlier. Otherwise, if any
//!   child shifted, the configured [`TieBreak`](crate::config::TieBreak)
//!   picks the winning signal and the rest are dropped.
//!
//! ## Example
//!
//! ```rust,ignore
//! use kont_runtime::{cont, scope, Cont};
//!
//! let c: Cont<i32, String> = cont(|eff| {
//!     scope(|s| {
//!         s.spawn(move |_| eff.shift::<()>(1));
//!         s.spawn(move |_| eff.shift::<()>(2));
//!         Ok("overwritten by a shift".to_string())
//!     })
//! });
//! assert!(matches!(c.to_result(), Err(1) | Err(2)));
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ScopedJoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::cancellation::{
    current_token, CancellationError, CancellationSource, CancellationToken, CurrentTokenGuard,
};
use crate::config::{ScopeConfig, TieBreak};
use crate::shift::Shifted;

/// What a child task sees of its scope.
#[derive(Debug, Clone)]
pub struct ChildContext {
    index: usize,
    token: CancellationToken,
}

impl ChildContext {
    /// Spawn position of this child within its scope.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The scope's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Check whether the scope was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Return an error once the scope is cancelled.
    pub fn check(&self) -> Result<(), CancellationError> {
        self.token.check()
    }

    /// Block until the scope is cancelled or `timeout` expires.
    pub fn wait_cancelled(&self, timeout: Duration) -> bool {
        self.token.wait(timeout)
    }
}

enum ChildExit {
    Done,
    Shifted(Shifted),
    Panicked(Box<dyn Any + Send>),
}

type Slot<'scope, T> = Arc<Mutex<Option<ScopedJoinHandle<'scope, Result<T, Shifted>>>>>;
type Joiner<'scope> = Box<dyn FnOnce() -> Option<ChildExit> + 'scope>;

/// Handle to a child task.
pub struct ChildHandle<'scope, T> {
    index: usize,
    slot: Slot<'scope, T>,
}

impl<T> ChildHandle<'_, T> {
    /// Spawn position of the child.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Check whether the child has finished running.
    pub fn is_finished(&self) -> bool {
        self.slot.lock().as_ref().is_none_or(|h| h.is_finished())
    }

    /// Wait for the child and return its result.
    ///
    /// A panic of the child is resumed on the joining thread.
    ///
    /// # Panics
    /// Panics if the scope already joined this child, which can only happen
    /// when the handle was moved into a sibling that outlived it.
    pub fn join(self) -> Result<T, Shifted> {
        let handle = self
            .slot
            .lock()
            .take()
            .unwrap_or_else(|| panic!("child {} was already joined by its scope", self.index));
        match handle.join() {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

impl<T> fmt::Debug for ChildHandle<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildHandle")
            .field("index", &self.index)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// A structured-concurrency scope. See the [module docs](self).
pub struct Scope<'scope, 'env: 'scope> {
    threads: &'scope thread::Scope<'scope, 'env>,
    source: Arc<CancellationSource>,
    config: ScopeConfig,
    children: RefCell<Vec<Joiner<'scope>>>,
    arrivals_tx: Sender<usize>,
    arrivals_rx: Receiver<usize>,
}

impl<'scope, 'env> Scope<'scope, 'env> {
    /// Spawn a child task.
    ///
    /// # Panics
    /// Panics if the OS refuses to create the thread.
    pub fn spawn<T, F>(&self, f: F) -> ChildHandle<'scope, T>
    where
        T: Send + 'scope,
        F: FnOnce(&ChildContext) -> Result<T, Shifted> + Send + 'scope,
    {
        let index = self.children.borrow().len();
        let cx = ChildContext {
            index,
            token: self.source.token(),
        };
        let source = Arc::clone(&self.source);
        let arrivals = self.arrivals_tx.clone();

        let mut builder =
            thread::Builder::new().name(format!("{}-{}", self.config.thread_name_prefix, index));
        if let Some(size) = self.config.stack_size {
            builder = builder.stack_size(size);
        }

        let handle = builder
            .spawn_scoped(self.threads, move || {
                let _current = CurrentTokenGuard::enter(cx.token.clone());
                match panic::catch_unwind(AssertUnwindSafe(|| f(&cx))) {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(signal)) => {
                        // Arrival order must be recorded before siblings can react.
                        let _ = arrivals.send(index);
                        tracing::debug!(child = index, token = %signal.token(), "child shifted");
                        source.cancel_with_reason(Some(format!("child {index} shifted")));
                        Err(signal)
                    }
                    Err(payload) => {
                        source.cancel_with_reason(Some(format!("child {index} panicked")));
                        panic::resume_unwind(payload)
                    }
                }
            })
            .expect("failed to spawn scope child thread");

        let slot: Slot<'scope, T> = Arc::new(Mutex::new(Some(handle)));
        let shared = Arc::clone(&slot);
        self.children.borrow_mut().push(Box::new(move || {
            let handle = shared.lock().take()?;
            Some(match handle.join() {
                Ok(Ok(_)) => ChildExit::Done,
                Ok(Err(signal)) => ChildExit::Shifted(signal),
                Err(payload) => ChildExit::Panicked(payload),
            })
        }));

        tracing::trace!(child = index, "spawned");
        ChildHandle { index, slot }
    }

    /// Cancel every child of this scope.
    pub fn cancel_all(&self) {
        self.source.cancel_with_reason(Some("cancelled by scope".to_string()));
    }

    /// The scope's cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.source.token()
    }

    /// Check whether the scope was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.source.is_cancelled()
    }

    /// The configuration this scope runs with.
    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    /// Number of children spawned so far.
    pub fn child_count(&self) -> usize {
        self.children.borrow().len()
    }

    fn finish<T>(self, outcome: thread::Result<Result<T, Shifted>>) -> Result<T, Shifted> {
        match &outcome {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => self
                .source
                .cancel_with_reason(Some("scope body shifted".to_string())),
            Err(_) => self
                .source
                .cancel_with_reason(Some("scope body panicked".to_string())),
        }

        let mut shifted: Vec<(usize, Shifted)> = Vec::new();
        let mut panicked: Option<Box<dyn Any + Send>> = None;
        for (index, joiner) in self.children.take().into_iter().enumerate() {
            match joiner() {
                None | Some(ChildExit::Done) => {}
                Some(ChildExit::Shifted(signal)) => shifted.push((index, signal)),
                Some(ChildExit::Panicked(payload)) => {
                    panicked.get_or_insert(payload);
                }
            }
        }

        let body = match outcome {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        };
        if let Some(payload) = panicked {
            panic::resume_unwind(payload);
        }

        match body {
            Err(signal) => {
                if !shifted.is_empty() {
                    tracing::debug!(dropped = shifted.len(), "body shift wins over child shifts");
                }
                Err(signal)
            }
            Ok(value) if shifted.is_empty() => Ok(value),
            Ok(_) => {
                let arrivals: Vec<usize> = self.arrivals_rx.try_iter().collect();
                let winner = pick_winner(self.config.tie_break, &arrivals, shifted);
                Err(winner)
            }
        }
    }
}

impl fmt::Debug for Scope<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("children", &self.child_count())
            .field("cancelled", &self.is_cancelled())
            .field("tie_break", &self.config.tie_break)
            .finish()
    }
}

/// Choose the surfacing signal among child shifts, listed in spawn order.
fn pick_winner(tie_break: TieBreak, arrivals: &[usize], mut shifted: Vec<(usize, Shifted)>) -> Shifted {
    debug_assert!(!shifted.is_empty());
    let position = match tie_break {
        TieBreak::LeftmostChild => 0,
        TieBreak::FirstObserved => arrivals
            .iter()
            .find_map(|arrived| shifted.iter().position(|(index, _)| index == arrived))
            .unwrap_or(0),
    };
    let (index, winner) = shifted.swap_remove(position);
    tracing::debug!(
        child = index,
        policy = %tie_break,
        dropped = shifted.len(),
        "concurrent shift resolved"
    );
    winner
}

/// Run `body` in a new scope configured from the global runtime configuration.
///
/// A scope opened while another scope is running on this thread (including
/// inside a child task) becomes its child for cancellation purposes.
pub fn scope<'env, T, F>(body: F) -> Result<T, Shifted>
where
    F: for<'scope> FnOnce(&Scope<'scope, 'env>) -> Result<T, Shifted>,
{
    let config = crate::runtime_config()
        .map(|c| c.scope.clone())
        .unwrap_or_default();
    scope_with(&config, body)
}

/// Run `body` in a new scope with an explicit configuration.
pub fn scope_with<'env, T, F>(config: &ScopeConfig, body: F) -> Result<T, Shifted>
where
    F: for<'scope> FnOnce(&Scope<'scope, 'env>) -> Result<T, Shifted>,
{
    let source = match current_token() {
        Some(parent) => CancellationSource::with_parent(parent),
        None => CancellationSource::new(),
    };

    thread::scope(|threads| {
        let (arrivals_tx, arrivals_rx) = unbounded();
        let scope = Scope {
            threads,
            source: Arc::new(source),
            config: config.clone(),
            children: RefCell::new(Vec::new()),
            arrivals_tx,
            arrivals_rx,
        };

        let outcome = {
            let _current = CurrentTokenGuard::enter(scope.source.token());
            panic::catch_unwind(AssertUnwindSafe(|| body(&scope)))
        };
        scope.finish(outcome)
    })
}
