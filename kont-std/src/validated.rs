//! `Validated`, a success-or-failure value that binds like `Either`.

use kont_runtime::{Bind, ContEffect, Shifted};

use crate::either::Either;

/// Outcome of a validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Validated<E, A> {
    /// The value passed validation.
    Valid(A),
    /// The value failed validation with `E`.
    Invalid(E),
}

impl<E, A> Validated<E, A> {
    /// Returns true for `Valid`.
    pub fn is_valid(&self) -> bool {
        matches!(self, Validated::Valid(_))
    }

    /// Returns true for `Invalid`.
    pub fn is_invalid(&self) -> bool {
        matches!(self, Validated::Invalid(_))
    }

    /// Map both cases into one value.
    pub fn fold<B>(self, on_invalid: impl FnOnce(E) -> B, on_valid: impl FnOnce(A) -> B) -> B {
        match self {
            Validated::Valid(a) => on_valid(a),
            Validated::Invalid(e) => on_invalid(e),
        }
    }

    /// Transform the valid value.
    pub fn map<B>(self, f: impl FnOnce(A) -> B) -> Validated<E, B> {
        match self {
            Validated::Valid(a) => Validated::Valid(f(a)),
            Validated::Invalid(e) => Validated::Invalid(e),
        }
    }

    /// Convert into `Either`, `Invalid` becoming `Left`.
    pub fn to_either(self) -> Either<E, A> {
        self.fold(Either::Left, Either::Right)
    }

    /// Convert into a `Result`, `Invalid` becoming `Err`.
    pub fn into_result(self) -> Result<A, E> {
        self.fold(Err, Ok)
    }
}

impl<E, A> From<Result<A, E>> for Validated<E, A> {
    fn from(result: Result<A, E>) -> Self {
        match result {
            Ok(a) => Validated::Valid(a),
            Err(e) => Validated::Invalid(e),
        }
    }
}

impl<E, A> From<Either<E, A>> for Validated<E, A> {
    fn from(either: Either<E, A>) -> Self {
        either.fold(Validated::Invalid, Validated::Valid)
    }
}

impl<E, B> Bind<E> for Validated<E, B> {
    type Output = B;

    fn bind(self, effect: &ContEffect<E>) -> Result<B, Shifted> {
        match self {
            Validated::Valid(b) => Ok(b),
            Validated::Invalid(e) => effect.shift(e),
        }
    }
}
