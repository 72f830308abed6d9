//! `Ior` and the accumulating `ior` builder.
//!
//! An [`Ior`] can hold a left value, a right value, or both. Inside [`ior`],
//! binding `Both(l, r)` folds `l` into a per-run accumulator and continues
//! with `r`, while `Left(l)` short-circuits. The accumulator is merged, never
//! overwritten, in encounter order:
//!
//! | Body ends with | Accumulator | Result |
//! |----------------|-------------|--------|
//! | value `a` | empty | `Right(a)` |
//! | value `a` | `acc` | `Both(acc, a)` |
//! | shift `e` | empty | `Left(e)` |
//! | shift `e` | `acc` | `Left(combine(acc, e))` |
//!
//! Left values that arrive after the run has shifted, for instance from a
//! sibling task of a [`scope`](kont_runtime::scope), are dropped.

use std::fmt;
use std::future::Future;
use std::mem;
use std::ops::Deref;
use std::sync::Arc;

use kont_runtime::{reset, reset_async, ContEffect, Exit, Shifted};
use parking_lot::Mutex;

use crate::either::Either;
use crate::semigroup::Semigroup;

/// An inclusive-or of two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ior<L, R> {
    /// Only a left value.
    Left(L),
    /// Only a right value.
    Right(R),
    /// Both values.
    Both(L, R),
}

impl<L, R> Ior<L, R> {
    /// Returns true for `Left`.
    pub fn is_left(&self) -> bool {
        matches!(self, Ior::Left(_))
    }

    /// Returns true for `Right`.
    pub fn is_right(&self) -> bool {
        matches!(self, Ior::Right(_))
    }

    /// Returns true for `Both`.
    pub fn is_both(&self) -> bool {
        matches!(self, Ior::Both(..))
    }

    /// The left value, if any.
    pub fn left(self) -> Option<L> {
        match self {
            Ior::Left(l) | Ior::Both(l, _) => Some(l),
            Ior::Right(_) => None,
        }
    }

    /// The right value, if any.
    pub fn right(self) -> Option<R> {
        match self {
            Ior::Right(r) | Ior::Both(_, r) => Some(r),
            Ior::Left(_) => None,
        }
    }

    /// Map every case into one value.
    pub fn fold<B>(
        self,
        on_left: impl FnOnce(L) -> B,
        on_right: impl FnOnce(R) -> B,
        on_both: impl FnOnce(L, R) -> B,
    ) -> B {
        match self {
            Ior::Left(l) => on_left(l),
            Ior::Right(r) => on_right(r),
            Ior::Both(l, r) => on_both(l, r),
        }
    }

    /// Transform the right value.
    pub fn map<B>(self, f: impl FnOnce(R) -> B) -> Ior<L, B> {
        match self {
            Ior::Left(l) => Ior::Left(l),
            Ior::Right(r) => Ior::Right(f(r)),
            Ior::Both(l, r) => Ior::Both(l, f(r)),
        }
    }

    /// Drop the left value of `Both`, keeping only the right.
    pub fn to_either(self) -> Either<L, R> {
        match self {
            Ior::Left(l) => Either::Left(l),
            Ior::Right(r) | Ior::Both(_, r) => Either::Right(r),
        }
    }
}

impl<L, R> From<Either<L, R>> for Ior<L, R> {
    fn from(either: Either<L, R>) -> Self {
        either.fold(Ior::Left, Ior::Right)
    }
}

/// Per-run accumulator state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accumulator<E> {
    /// Nothing accumulated yet.
    Empty,
    /// Left values combined so far.
    Accumulated(E),
    /// The run short-circuited and its left values were absorbed into the result.
    ShortCircuited,
}

type Combine<E> = Arc<dyn Fn(E, E) -> E + Send + Sync>;

/// The effect handle of an [`ior`] body.
///
/// Derefs to [`ContEffect`], so `shift`, `bind` and `ensure` are available
/// directly. [`bind_ior`](IorEffect::bind_ior) adds accumulation.
pub struct IorEffect<E> {
    effect: ContEffect<E>,
    state: Arc<Mutex<Accumulator<E>>>,
    combine: Combine<E>,
}

impl<E> IorEffect<E> {
    fn new(effect: ContEffect<E>, state: Arc<Mutex<Accumulator<E>>>, combine: Combine<E>) -> Self {
        Self {
            effect,
            state,
            combine,
        }
    }

    /// Unwrap an `Ior`.
    ///
    /// `Right(r)` yields `r`; `Both(l, r)` combines `l` into the accumulator
    /// and yields `r`; `Left(l)` shifts `l`.
    pub fn bind_ior<B>(&self, value: Ior<E, B>) -> Result<B, Shifted> {
        match value {
            Ior::Right(b) => Ok(b),
            Ior::Both(l, b) => {
                self.accumulate(l);
                Ok(b)
            }
            Ior::Left(l) => self.effect.shift(l),
        }
    }

    /// Combine `left` into the accumulator without short-circuiting.
    ///
    /// Once the run has shifted, possibly from a sibling task, `left` is
    /// dropped: the short-circuit only absorbs what was accumulated before it.
    ///
    /// # Panics
    /// Panics if the owning run already terminated.
    pub fn accumulate(&self, left: E) {
        let state = self.effect.state();
        if state.is_terminal() {
            panic!("accumulate on {} after its scope {}", self.effect.token(), state);
        }
        let merged = self.effect.unless_shifted(|| {
            let mut acc = self.state.lock();
            *acc = match mem::replace(&mut *acc, Accumulator::Empty) {
                Accumulator::Accumulated(prev) => Accumulator::Accumulated((self.combine)(prev, left)),
                Accumulator::Empty | Accumulator::ShortCircuited => Accumulator::Accumulated(left),
            };
        });
        if merged.is_none() {
            tracing::debug!(token = %self.effect.token(), "left value after shift dropped");
        }
    }
}

impl<E> Deref for IorEffect<E> {
    type Target = ContEffect<E>;

    fn deref(&self) -> &ContEffect<E> {
        &self.effect
    }
}

impl<E> Clone for IorEffect<E> {
    fn clone(&self) -> Self {
        Self {
            effect: self.effect.clone(),
            state: Arc::clone(&self.state),
            combine: Arc::clone(&self.combine),
        }
    }
}

impl<E> fmt::Debug for IorEffect<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IorEffect")
            .field("effect", &self.effect)
            .finish_non_exhaustive()
    }
}

/// Fold one finished run into its `Ior`.
fn settle_ior<E, A>(
    exit: Exit<E, A>,
    state: &Mutex<Accumulator<E>>,
    combine: &Combine<E>,
) -> Ior<E, A> {
    let mut acc = state.lock();
    match exit {
        Exit::Value(a) => match mem::replace(&mut *acc, Accumulator::Empty) {
            Accumulator::Accumulated(l) => Ior::Both(l, a),
            Accumulator::Empty | Accumulator::ShortCircuited => Ior::Right(a),
        },
        Exit::ShortCircuit(e) => match mem::replace(&mut *acc, Accumulator::ShortCircuited) {
            Accumulator::Accumulated(l) => Ior::Left(combine(l, e)),
            Accumulator::Empty | Accumulator::ShortCircuited => Ior::Left(e),
        },
    }
}

/// Run `body` at once, accumulating left values with `combine`.
///
/// # Panics
/// Panics if a shift owned by an enclosing scope escapes the body. Use
/// [`try_ior`] when nesting inside another computation.
///
/// # Example
///
/// ```rust,ignore
/// use kont_std::{ior, Ior};
///
/// let res = ior(|a: String, b: String| a + &b, |eff| {
///     let a = eff.bind_ior(Ior::Both("Hello".to_string(), 1))?;
///     let b = eff.bind_ior(Ior::Both(", World!".to_string(), 2))?;
///     Ok(a + b)
/// });
/// assert_eq!(res, Ior::Both("Hello, World!".to_string(), 3));
/// ```
pub fn ior<E, A, C, F>(combine: C, body: F) -> Ior<E, A>
where
    C: Fn(E, E) -> E + Send + Sync + 'static,
    F: FnOnce(&IorEffect<E>) -> Result<A, Shifted>,
{
    match try_ior(combine, body) {
        Ok(result) => result,
        Err(foreign) => panic!("{foreign} escaped to a top-level ior"),
    }
}

/// Like [`ior`], returning shifts owned by enclosing scopes as `Err`.
pub fn try_ior<E, A, C, F>(combine: C, body: F) -> Result<Ior<E, A>, Shifted>
where
    C: Fn(E, E) -> E + Send + Sync + 'static,
    F: FnOnce(&IorEffect<E>) -> Result<A, Shifted>,
{
    let combine: Combine<E> = Arc::new(combine);
    let state = Arc::new(Mutex::new(Accumulator::Empty));
    let exit = reset(|eff: &ContEffect<E>| {
        let eff = IorEffect::new(eff.clone(), Arc::clone(&state), Arc::clone(&combine));
        body(&eff)
    })?;
    Ok(settle_ior(exit, &state, &combine))
}

/// [`ior`] with the [`Semigroup`] combination of `E`.
pub fn ior_semigroup<E, A, F>(body: F) -> Ior<E, A>
where
    E: Semigroup + 'static,
    F: FnOnce(&IorEffect<E>) -> Result<A, Shifted>,
{
    ior(E::combine, body)
}

/// Asynchronous [`ior`].
///
/// # Panics
/// Panics if a shift owned by an enclosing scope escapes the body.
pub async fn ior_async<E, A, C, F, Fut>(combine: C, body: F) -> Ior<E, A>
where
    C: Fn(E, E) -> E + Send + Sync + 'static,
    F: FnOnce(IorEffect<E>) -> Fut,
    Fut: Future<Output = Result<A, Shifted>>,
{
    let combine: Combine<E> = Arc::new(combine);
    let state = Arc::new(Mutex::new(Accumulator::Empty));
    let run = {
        let state = Arc::clone(&state);
        let combine = Arc::clone(&combine);
        reset_async(move |eff| body(IorEffect::new(eff, state, combine)))
    };
    match run.await {
        Ok(exit) => settle_ior(exit, &state, &combine),
        Err(foreign) => panic!("{foreign} escaped to a top-level ior"),
    }
}
