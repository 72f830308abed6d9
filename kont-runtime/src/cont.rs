//! # Delimited Continuations
//!
//! This module implements the interpreter that installs a scope boundary
//! (`reset`), runs a body inside it, and recovers either the body's value or
//! a value shifted out of it.
//!
//! ## Design
//!
//! Shifting is an explicit tagged result rather than unwinding. A body has the
//! shape `FnOnce(&ContEffect<R>) -> Result<A, Shifted>`. When the body shifts,
//! the payload is stashed in the activation's frame and the [`Shifted`] signal
//! is returned as `Err`, travelling up through any number of nested calls and
//! scopes via `?`. The interpreter compares the signal's token with the one it
//! minted:
//!
//! 1. **Own signal**: the stashed payload is claimed and the activation ends
//!    in [`Exit::ShortCircuit`].
//! 2. **Foreign signal**: it belongs to an enclosing scope and is returned
//!    untouched for the caller to propagate.
//!
//! Panics are never translated; they pass straight through `fold`.
//!
//! ## One-Shot
//!
//! Each activation is one-shot: the signal is move-only and claimed at most
//! once. A [`Cont`] on the other hand is a description of a computation, and
//! every `fold` re-runs the body from scratch with a fresh token.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use crate::effect::{Bind, ContEffect};
use crate::panic::{catch_panic_unchecked, CaughtPanic};
use crate::shift::{ScopeState, Shifted};

/// Outcome of one interpreter activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exit<R, A> {
    /// The body ran to completion.
    Value(A),
    /// The body shifted a value owned by this scope.
    ShortCircuit(R),
}

impl<R, A> Exit<R, A> {
    /// Map both branches into one value.
    pub fn fold<B>(self, recover: impl FnOnce(R) -> B, transform: impl FnOnce(A) -> B) -> B {
        match self {
            Exit::Value(a) => transform(a),
            Exit::ShortCircuit(r) => recover(r),
        }
    }

    /// Convert into a `Result`, the short-circuit becoming `Err`.
    pub fn into_result(self) -> Result<A, R> {
        match self {
            Exit::Value(a) => Ok(a),
            Exit::ShortCircuit(r) => Err(r),
        }
    }

    /// Returns true if the body ran to completion.
    pub fn is_value(&self) -> bool {
        matches!(self, Exit::Value(_))
    }
}

/// Terminates the frame as failed if the body unwinds out of `reset`.
struct FrameGuard<'a, R> {
    effect: &'a ContEffect<R>,
}

impl<R> Drop for FrameGuard<'_, R> {
    fn drop(&mut self) {
        if !self.effect.state().is_terminal() {
            self.effect.frame().abandon();
        }
    }
}

/// Install a scope boundary and run `body` inside it.
///
/// Returns `Ok(exit)` for a normal completion or an intercepted shift owned
/// by this scope, and `Err(signal)` for a shift owned by an enclosing scope.
pub fn reset<R, A, F>(body: F) -> Result<Exit<R, A>, Shifted>
where
    F: FnOnce(&ContEffect<R>) -> Result<A, Shifted>,
{
    let effect = ContEffect::new();
    let guard = FrameGuard { effect: &effect };
    tracing::trace!(token = %effect.token(), "reset");

    let result = body(&effect);
    let exit = settle(&effect, result);
    drop(guard);
    exit
}

/// Turn the body's result into the activation's exit.
pub(crate) fn settle<R, A>(
    effect: &ContEffect<R>,
    result: Result<A, Shifted>,
) -> Result<Exit<R, A>, Shifted> {
    let token = effect.token();
    match result {
        Ok(value) => {
            effect.frame().finish(ScopeState::Completed);
            tracing::trace!(token = %token, "completed");
            Ok(Exit::Value(value))
        }
        Err(signal) if signal.belongs_to(token) => {
            let payload = effect.frame().claim(signal);
            tracing::trace!(token = %token, "short-circuited");
            Ok(Exit::ShortCircuit(payload))
        }
        Err(signal) => {
            effect.frame().finish(ScopeState::Failed);
            tracing::debug!(token = %token, owner = %signal.token(), "propagating foreign shift");
            Err(signal)
        }
    }
}

type Body<R, A> = dyn Fn(&ContEffect<R>) -> Result<A, Shifted> + Send + Sync;

/// A lazy computation that either completes with `A` or short-circuits with `R`.
///
/// Holds nothing but the body. Nothing runs until [`fold`](Cont::fold) (or
/// one of its wrappers) is called, and each call runs the body afresh.
pub struct Cont<R, A> {
    body: Arc<Body<R, A>>,
}

/// Construct a [`Cont`] from a body.
///
/// # Example
///
/// ```rust,ignore
/// use kont_runtime::{cont, ContEffect};
///
/// let c = cont(|eff: &ContEffect<String>| {
///     let x = eff.bind(Ok::<_, String>(1))?;
///     let y: i32 = eff.bind_option(None, || "empty".to_string())?;
///     Ok(x + y)
/// });
/// assert_eq!(c.fold(|s| s, |n| n.to_string()), "empty");
/// ```
pub fn cont<R, A, F>(body: F) -> Cont<R, A>
where
    F: Fn(&ContEffect<R>) -> Result<A, Shifted> + Send + Sync + 'static,
{
    Cont {
        body: Arc::new(body),
    }
}

impl<R, A> Cont<R, A> {
    /// Run the computation, recovering a shifted `R` or transforming the value.
    ///
    /// # Panics
    /// Panics if a shift owned by some other scope reaches this fold. That
    /// only happens when an effect handle escaped the scope it belongs to;
    /// nested folds inside a body should use [`try_fold`](Cont::try_fold).
    pub fn fold<B>(&self, recover: impl FnOnce(R) -> B, transform: impl FnOnce(A) -> B) -> B {
        match self.try_fold(recover, transform) {
            Ok(b) => b,
            Err(foreign) => panic!("{foreign} escaped to a top-level fold"),
        }
    }

    /// Run the computation, returning shifts owned by enclosing scopes as `Err`.
    pub fn try_fold<B>(
        &self,
        recover: impl FnOnce(R) -> B,
        transform: impl FnOnce(A) -> B,
    ) -> Result<B, Shifted> {
        reset(|eff| (self.body)(eff)).map(|exit| exit.fold(recover, transform))
    }

    /// Like [`fold`](Cont::fold), additionally folding a panic raised by the body.
    pub fn fold_catching<B>(
        &self,
        error: impl FnOnce(CaughtPanic) -> B,
        recover: impl FnOnce(R) -> B,
        transform: impl FnOnce(A) -> B,
    ) -> B {
        match catch_panic_unchecked(|| self.fold(recover, transform)) {
            Ok(b) => b,
            Err(panic) => error(panic),
        }
    }

    /// Run the computation into a `Result`, the short-circuit becoming `Err`.
    pub fn to_result(&self) -> Result<A, R> {
        self.fold(Err, Ok)
    }

    /// Run the computation into an [`Exit`].
    pub fn run(&self) -> Exit<R, A> {
        self.fold(Exit::ShortCircuit, Exit::Value)
    }
}

impl<A> Cont<Infallible, A> {
    /// Run a computation that cannot short-circuit.
    pub fn value(&self) -> A {
        self.fold(|never| match never {}, |a| a)
    }
}

impl<R: 'static, A: 'static> Cont<R, A> {
    /// Capture a panic of the body as an `Err` value instead of unwinding.
    ///
    /// Shifts are not affected.
    pub fn attempt(&self) -> Cont<R, Result<A, CaughtPanic>> {
        let body = Arc::clone(&self.body);
        cont(move |eff| match catch_panic_unchecked(|| body(eff)) {
            Ok(result) => result.map(Ok),
            Err(panic) => Ok(Err(panic)),
        })
    }

    /// Transform the value with `transform`.
    pub fn map<B, F>(&self, transform: F) -> Cont<R, B>
    where
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        let body = Arc::clone(&self.body);
        cont(move |eff| body(eff).map(&transform))
    }

    /// Continue with the computation returned by `transform`.
    pub fn flat_map<B, F>(&self, transform: F) -> Cont<R, B>
    where
        B: 'static,
        F: Fn(A) -> Cont<R, B> + Send + Sync + 'static,
    {
        let body = Arc::clone(&self.body);
        cont(move |eff| {
            let a = body(eff)?;
            eff.bind(transform(a))
        })
    }

    /// Recover a short-circuit into a value, yielding a computation that cannot shift.
    pub fn handle_error<F>(&self, recover: F) -> Cont<Infallible, A>
    where
        F: Fn(R) -> A + Send + Sync + 'static,
    {
        let inner = self.clone();
        cont(move |_| inner.try_fold(&recover, |a| a))
    }

    /// Recover a short-circuit with another computation.
    pub fn handle_error_with<R2, F>(&self, recover: F) -> Cont<R2, A>
    where
        R2: 'static,
        F: Fn(R) -> Cont<R2, A> + Send + Sync + 'static,
    {
        let inner = self.clone();
        cont(move |eff| match inner.try_fold(Err, Ok)? {
            Ok(a) => Ok(a),
            Err(r) => eff.bind(recover(r)),
        })
    }

    /// Map both branches into a value, yielding a computation that cannot shift.
    pub fn redeem<B, F, G>(&self, recover: F, transform: G) -> Cont<Infallible, B>
    where
        F: Fn(R) -> B + Send + Sync + 'static,
        G: Fn(A) -> B + Send + Sync + 'static,
    {
        let inner = self.clone();
        cont(move |_| inner.try_fold(&recover, &transform))
    }

    /// Continue both branches with another computation.
    pub fn redeem_with<R2, B, F, G>(&self, recover: F, transform: G) -> Cont<R2, B>
    where
        R2: 'static,
        B: 'static,
        F: Fn(R) -> Cont<R2, B> + Send + Sync + 'static,
        G: Fn(A) -> Cont<R2, B> + Send + Sync + 'static,
    {
        let inner = self.clone();
        cont(move |eff| {
            let next = inner.try_fold(&recover, &transform)?;
            eff.bind(next)
        })
    }
}

impl<R, A> Clone for Cont<R, A> {
    fn clone(&self) -> Self {
        Self {
            body: Arc::clone(&self.body),
        }
    }
}

impl<R, A> fmt::Debug for Cont<R, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cont").finish_non_exhaustive()
    }
}

/// Apply `transform` to every item, short-circuiting on the first shift.
pub fn traverse<R, A, B, I, F>(items: I, transform: F) -> Cont<R, Vec<B>>
where
    R: 'static,
    B: 'static,
    I: IntoIterator<Item = A>,
    A: Send + Sync + 'static,
    F: Fn(&A) -> Cont<R, B> + Send + Sync + 'static,
{
    let items: Vec<A> = items.into_iter().collect();
    cont(move |eff| items.iter().map(|item| eff.bind(transform(item))).collect())
}

/// Run every computation in order, collecting their values.
pub fn sequence<R, A>(conts: Vec<Cont<R, A>>) -> Cont<R, Vec<A>>
where
    R: 'static,
    A: 'static,
{
    cont(move |eff| conts.iter().map(|c| eff.bind(c)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_immediate_value() {
        let c: Cont<Infallible, i32> = cont(|_| Ok(1));
        assert_eq!(c.value(), 1);
    }

    #[test]
    fn test_immediate_short_circuit() {
        let c: Cont<String, i32> = cont(|eff| eff.shift("hello".to_string()));
        assert_eq!(c.fold(|s| s, |n| n.to_string()), "hello");
    }

    #[test]
    fn test_fold_maps_both_branches() {
        let shifted: Cont<String, i32> = cont(|eff| eff.shift("Hello, World!".to_string()));
        assert_eq!(shifted.fold(|s| s.len(), |n| n as usize), 13);

        let value: Cont<String, i32> = cont(|_| Ok(1000));
        assert_eq!(value.fold(|s| s.len() as i32, |n| n), 1000);
    }

    #[test]
    fn test_nested_short_circuit_stays_inner() {
        let outer: Cont<String, i32> = cont(|_outer| {
            let inner: Cont<String, i64> = cont(|eff| eff.shift("inner".to_string()));
            let s = inner.try_fold(|s| s, |n| n.to_string())?;
            assert_eq!(s, "inner");
            Ok(1)
        });
        assert_eq!(outer.to_result(), Ok(1));
    }

    #[test]
    fn test_shift_to_outer_from_nested_block() {
        let outer: Cont<String, i32> = cont(|outer| {
            let outer = outer.clone();
            let inner: Cont<Infallible, i64> = cont(move |_| outer.shift("test".to_string()));
            inner.try_fold(|never| match never {}, |_| ())?;
            unreachable!("the outer shift must unwind past this point");
        });
        assert_eq!(outer.to_result(), Err("test".to_string()));
    }

    #[test]
    fn test_reset_returns_foreign_signal() {
        let outer: ContEffect<u8> = ContEffect::new();
        let result = reset(|_inner: &ContEffect<String>| outer.shift::<()>(9));
        let signal = result.unwrap_err();
        assert!(signal.belongs_to(outer.token()));
        assert_eq!(outer.frame().claim(signal), 9);
    }

    #[test]
    #[should_panic(expected = "escaped to a top-level fold")]
    fn test_foreign_signal_at_top_level_panics() {
        let outer: ContEffect<u8> = ContEffect::new();
        let c: Cont<String, ()> = cont(move |_| outer.shift(1));
        c.fold(|_| (), |_| ());
    }

    #[test]
    #[should_panic(expected = "boom")]
    fn test_panics_pass_through() {
        let c: Cont<String, ()> = cont(|_| panic!("boom"));
        c.fold(|_| (), |_| ());
    }

    #[test]
    fn test_ignored_shift_then_second_shift() {
        let c: Cont<String, i32> = cont(|eff| {
            let _ignored: Result<i32, Shifted> = eff.shift("first".to_string());
            eff.shift("second".to_string())
        });
        assert_eq!(c.to_result(), Err("second".to_string()));
    }

    #[test]
    fn test_ignored_shift_then_value() {
        let c: Cont<String, i32> = cont(|eff| {
            let x = eff.shift::<i32>("ignored".to_string()).unwrap_or(5);
            Ok(x * 2)
        });
        assert_eq!(c.to_result(), Ok(10));
    }

    #[test]
    fn test_refold_reruns_body_with_fresh_token() {
        let runs = Arc::new(AtomicUsize::new(0));
        let tokens = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let c: Cont<Infallible, usize> = {
            let runs = Arc::clone(&runs);
            let tokens = Arc::clone(&tokens);
            cont(move |eff| {
                tokens.lock().push(eff.token());
                Ok(runs.fetch_add(1, Ordering::SeqCst))
            })
        };
        assert_eq!(c.value(), 0);
        assert_eq!(c.value(), 1);
        let tokens = tokens.lock();
        assert_ne!(tokens[0], tokens[1]);
    }

    #[test]
    fn test_effect_is_inert_after_fold() {
        let leaked = Arc::new(parking_lot::Mutex::new(None));
        let c: Cont<String, ()> = {
            let leaked = Arc::clone(&leaked);
            cont(move |eff| {
                *leaked.lock() = Some(eff.clone());
                Ok(())
            })
        };
        c.fold(|_| (), |_| ());
        let eff = leaked.lock().take().unwrap();
        assert_eq!(eff.state(), ScopeState::Completed);
        let shifted = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            eff.shift::<()>("late".to_string())
        }));
        assert!(shifted.is_err());
    }

    #[test]
    fn test_frame_marked_failed_on_panic() {
        let leaked = Arc::new(parking_lot::Mutex::new(None));
        let c: Cont<String, ()> = {
            let leaked = Arc::clone(&leaked);
            cont(move |eff| {
                *leaked.lock() = Some(eff.clone());
                panic!("body failed")
            })
        };
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| c.run()));
        let eff = leaked.lock().take().unwrap();
        assert_eq!(eff.state(), ScopeState::Failed);
    }

    #[test]
    fn test_fold_catching() {
        let c: Cont<String, i32> = cont(|_| panic!("kaboom"));
        let out = c.fold_catching(|p| p.message().to_string(), |s| s, |n| n.to_string());
        assert_eq!(out, "kaboom");
    }

    #[test]
    fn test_attempt_captures_panic_not_shift() {
        let panicking: Cont<String, i32> = cont(|_| panic!("bad"));
        let attempted = panicking.attempt().to_result().unwrap();
        assert_eq!(attempted.unwrap_err().message(), "bad");

        let shifting: Cont<String, i32> = cont(|eff| eff.shift("s".to_string()));
        assert_eq!(shifting.attempt().to_result().unwrap_err(), "s");
    }

    #[test]
    fn test_map_and_flat_map() {
        let c: Cont<String, i32> = cont(|_| Ok(20));
        assert_eq!(c.map(|n| n + 1).to_result(), Ok(21));

        let chained = c.flat_map(|n| cont(move |eff: &ContEffect<String>| {
            eff.ensure(n > 100, || format!("{n} too small"))?;
            Ok(n)
        }));
        assert_eq!(chained.to_result(), Err("20 too small".to_string()));
    }

    #[test]
    fn test_handle_error_and_redeem() {
        let c: Cont<String, usize> = cont(|eff| eff.shift("four".to_string()));
        assert_eq!(c.handle_error(|s| s.len()).value(), 4);
        assert_eq!(c.redeem(|s| s.len() * 10, |n| n).value(), 40);

        let recovered = c.handle_error_with(|s: String| cont(move |eff: &ContEffect<u8>| {
            eff.ensure(s.is_empty(), || 7)?;
            Ok(0)
        }));
        assert_eq!(recovered.to_result(), Err(7));

        let redeemed = c.redeem_with(
            |s| cont(move |_: &ContEffect<u8>| Ok(s.len() as i64)),
            |n| cont(move |_: &ContEffect<u8>| Ok(n as i64)),
        );
        assert_eq!(redeemed.to_result(), Ok(4));
    }

    #[test]
    fn test_traverse_short_circuits_on_first() {
        let seen = Arc::new(AtomicUsize::new(0));
        let c = {
            let seen = Arc::clone(&seen);
            traverse(vec![1, 2, -3, 4, -5], move |&n| {
                seen.fetch_add(1, Ordering::SeqCst);
                cont(move |eff: &ContEffect<i32>| {
                    eff.ensure(n > 0, || n)?;
                    Ok(n * 2)
                })
            })
        };
        assert_eq!(c.to_result(), Err(-3));
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_sequence_collects_values() {
        let conts: Vec<Cont<String, i32>> = (1..=3).map(|n| cont(move |_| Ok(n))).collect();
        assert_eq!(sequence(conts).to_result(), Ok(vec![1, 2, 3]));
    }
}
