//! `Either` and the `either` builder.

use std::future::Future;

use kont_runtime::{fold_async, reset, try_fold_async, Bind, ContEffect, Exit, Shifted};

/// A value of one of two types, by convention `Left` for the short-circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Either<L, R> {
    /// The left (short-circuit) case.
    Left(L),
    /// The right (success) case.
    Right(R),
}

impl<L, R> Either<L, R> {
    /// Returns true for `Left`.
    pub fn is_left(&self) -> bool {
        matches!(self, Either::Left(_))
    }

    /// Returns true for `Right`.
    pub fn is_right(&self) -> bool {
        matches!(self, Either::Right(_))
    }

    /// The left value, if any.
    pub fn left(self) -> Option<L> {
        match self {
            Either::Left(l) => Some(l),
            Either::Right(_) => None,
        }
    }

    /// The right value, if any.
    pub fn right(self) -> Option<R> {
        match self {
            Either::Left(_) => None,
            Either::Right(r) => Some(r),
        }
    }

    /// Map both cases into one value.
    pub fn fold<B>(self, on_left: impl FnOnce(L) -> B, on_right: impl FnOnce(R) -> B) -> B {
        match self {
            Either::Left(l) => on_left(l),
            Either::Right(r) => on_right(r),
        }
    }

    /// Transform the right value.
    pub fn map<B>(self, f: impl FnOnce(R) -> B) -> Either<L, B> {
        match self {
            Either::Left(l) => Either::Left(l),
            Either::Right(r) => Either::Right(f(r)),
        }
    }

    /// Transform the left value.
    pub fn map_left<B>(self, f: impl FnOnce(L) -> B) -> Either<B, R> {
        match self {
            Either::Left(l) => Either::Left(f(l)),
            Either::Right(r) => Either::Right(r),
        }
    }

    /// Swap the two cases.
    pub fn swap(self) -> Either<R, L> {
        match self {
            Either::Left(l) => Either::Right(l),
            Either::Right(r) => Either::Left(r),
        }
    }

    /// Convert into a `Result` with `Left` as the error.
    pub fn into_result(self) -> Result<R, L> {
        match self {
            Either::Left(l) => Err(l),
            Either::Right(r) => Ok(r),
        }
    }
}

impl<L, R> From<Result<R, L>> for Either<L, R> {
    fn from(result: Result<R, L>) -> Self {
        match result {
            Ok(r) => Either::Right(r),
            Err(l) => Either::Left(l),
        }
    }
}

impl<L, R> From<Exit<L, R>> for Either<L, R> {
    fn from(exit: Exit<L, R>) -> Self {
        exit.fold(Either::Left, Either::Right)
    }
}

/// Unwraps `Right`, shifts the `Left` payload.
impl<L, B> Bind<L> for Either<L, B> {
    type Output = B;

    fn bind(self, effect: &ContEffect<L>) -> Result<B, Shifted> {
        match self {
            Either::Left(l) => effect.shift(l),
            Either::Right(b) => Ok(b),
        }
    }
}

/// Run `body` at once, collecting its short-circuit as `Left` and its value as `Right`.
///
/// # Panics
/// Panics if a shift owned by an enclosing scope escapes the body. Use
/// [`try_either`] when nesting inside another computation.
///
/// # Example
///
/// ```rust,ignore
/// use kont_std::{either, Either};
///
/// let res = either(|eff| {
///     let a = eff.bind(Either::<String, i32>::Right(1))?;
///     let b = eff.bind(Either::<String, i32>::Left("nope".into()))?;
///     Ok(a + b)
/// });
/// assert_eq!(res, Either::Left("nope".to_string()));
/// ```
pub fn either<E, A, F>(body: F) -> Either<E, A>
where
    F: FnOnce(&ContEffect<E>) -> Result<A, Shifted>,
{
    match try_either(body) {
        Ok(result) => result,
        Err(foreign) => panic!("{foreign} escaped to a top-level either"),
    }
}

/// Like [`either`], returning shifts owned by enclosing scopes as `Err`.
pub fn try_either<E, A, F>(body: F) -> Result<Either<E, A>, Shifted>
where
    F: FnOnce(&ContEffect<E>) -> Result<A, Shifted>,
{
    reset(body).map(Either::from)
}

/// Asynchronous [`either`].
pub async fn either_async<E, A, F, Fut>(body: F) -> Either<E, A>
where
    F: FnOnce(ContEffect<E>) -> Fut,
    Fut: Future<Output = Result<A, Shifted>>,
{
    fold_async(body, Either::Left, Either::Right).await
}

/// Asynchronous [`try_either`].
pub async fn try_either_async<E, A, F, Fut>(body: F) -> Result<Either<E, A>, Shifted>
where
    F: FnOnce(ContEffect<E>) -> Fut,
    Fut: Future<Output = Result<A, Shifted>>,
{
    try_fold_async(body, Either::Left, Either::Right).await
}
