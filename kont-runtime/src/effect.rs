//! The capability handed to a computation body.
//!
//! A [`ContEffect<R>`] is bound to exactly one interpreter activation. Every
//! operation on it is expressed in terms of [`ContEffect::shift`], which
//! stashes the payload and returns the [`Shifted`] signal as an `Err`. Bodies
//! thread that signal outward with `?`.
//!
//! ```rust,ignore
//! use kont_runtime::{cont, ContEffect, Shifted};
//!
//! let parsed = cont(|eff: &ContEffect<String>| {
//!     let n: i32 = eff.bind_result("42".parse::<i32>(), |e| e.to_string())?;
//!     eff.ensure(n > 0, || "not positive".to_string())?;
//!     Ok(n * 2)
//! });
//! assert_eq!(parsed.fold(|_| 0, |n| n), 84);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::cont::Cont;
use crate::shift::{Frame, ScopeState, Shifted};
use crate::token::Token;

/// Short-circuit capability for one activation of the interpreter.
///
/// Cloning is cheap and every clone refers to the same activation, so the
/// handle can be shared with child tasks running under structured
/// concurrency. It becomes inert once the activation terminates: shifting
/// through a stale handle panics.
pub struct ContEffect<R> {
    frame: Arc<Frame<R>>,
}

impl<R> ContEffect<R> {
    pub(crate) fn new() -> Self {
        Self {
            frame: Arc::new(Frame::new()),
        }
    }

    pub(crate) fn frame(&self) -> &Frame<R> {
        &self.frame
    }

    /// Token of the activation this handle belongs to.
    pub fn token(&self) -> Token {
        self.frame.token()
    }

    /// Current lifecycle state of the activation.
    pub fn state(&self) -> ScopeState {
        self.frame.state()
    }

    /// Short-circuit the computation with `r`.
    ///
    /// Never returns `Ok`: the `B` parameter can be instantiated at whatever
    /// type the call site needs.
    ///
    /// # Panics
    /// Panics if the owning activation already terminated.
    pub fn shift<B>(&self, r: R) -> Result<B, Shifted> {
        let signal = self.frame.stash(r);
        tracing::debug!(token = %signal.token(), "shift");
        Err(signal)
    }

    /// Run `f` only if no shift was raised through this activation yet.
    ///
    /// Returns `None` once any shift was stashed, even one still travelling
    /// towards the owning scope. Shifts from other threads block until `f`
    /// returns, so `f` must not shift through this activation itself.
    pub fn unless_shifted<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        self.frame.unless_shifted(f)
    }

    /// Unwrap a value, shifting on its short-circuit case.
    pub fn bind<T: Bind<R>>(&self, value: T) -> Result<T::Output, Shifted> {
        value.bind(self)
    }

    /// Pass `Ok` through; map `Err` with `transform` and shift it.
    pub fn bind_result<B, E>(
        &self,
        result: Result<B, E>,
        transform: impl FnOnce(E) -> R,
    ) -> Result<B, Shifted> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => self.shift(transform(e)),
        }
    }

    /// Pass `Some` through; shift `or_shift()` on `None`.
    pub fn bind_option<B>(&self, option: Option<B>, or_shift: impl FnOnce() -> R) -> Result<B, Shifted> {
        match option {
            Some(value) => Ok(value),
            None => self.shift(or_shift()),
        }
    }

    /// Shift `or_shift()` unless `condition` holds.
    pub fn ensure(&self, condition: bool, or_shift: impl FnOnce() -> R) -> Result<(), Shifted> {
        if condition {
            Ok(())
        } else {
            self.shift(or_shift())
        }
    }

    /// Narrow an optional value, shifting `or_shift()` when it is absent.
    ///
    /// If this returns `Ok`, the value was present.
    pub fn ensure_not_null<B>(
        &self,
        value: Option<B>,
        or_shift: impl FnOnce() -> R,
    ) -> Result<B, Shifted> {
        self.bind_option(value, or_shift)
    }
}

impl<R> Clone for ContEffect<R> {
    fn clone(&self) -> Self {
        Self {
            frame: Arc::clone(&self.frame),
        }
    }
}

impl<R> fmt::Debug for ContEffect<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContEffect")
            .field("token", &self.token())
            .field("state", &self.state())
            .finish()
    }
}

/// Values that can be unwrapped inside a computation with short-circuit type `R`.
///
/// Implementations return the success value, or shift the short-circuit
/// value through `effect`.
pub trait Bind<R> {
    /// The value produced when binding succeeds.
    type Output;

    /// Unwrap `self`, shifting through `effect` on the short-circuit case.
    fn bind(self, effect: &ContEffect<R>) -> Result<Self::Output, Shifted>;
}

impl<R, B> Bind<R> for Result<B, R> {
    type Output = B;

    fn bind(self, effect: &ContEffect<R>) -> Result<B, Shifted> {
        match self {
            Ok(value) => Ok(value),
            Err(r) => effect.shift(r),
        }
    }
}

/// Runs the inner computation, piping its short-circuit into the outer one.
impl<R, B> Bind<R> for &Cont<R, B> {
    type Output = B;

    fn bind(self, effect: &ContEffect<R>) -> Result<B, Shifted> {
        self.try_fold(|r| effect.shift(r), Ok)?
    }
}

impl<R, B> Bind<R> for Cont<R, B> {
    type Output = B;

    fn bind(self, effect: &ContEffect<R>) -> Result<B, Shifted> {
        (&self).bind(effect)
    }
}
