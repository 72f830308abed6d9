//! Conversions from a [`Cont`] into the wrapper types of this crate.

use kont_runtime::Cont;

use crate::either::Either;
use crate::ior::Ior;
use crate::validated::Validated;

/// Extension methods folding a [`Cont`] into a wrapper value.
///
/// Each call runs the computation afresh, like [`Cont::fold`].
pub trait ContExt<R, A> {
    /// Fold into `Left(r)` or `Right(a)`.
    fn to_either(&self) -> Either<R, A>;

    /// Fold into `Left(r)` or `Right(a)`.
    fn to_ior(&self) -> Ior<R, A>;

    /// Fold into `Invalid(r)` or `Valid(a)`.
    fn to_validated(&self) -> Validated<R, A>;

    /// Fold into `Some(a)`, letting `or_else` decide what a short-circuit becomes.
    fn to_option(&self, or_else: impl FnOnce(R) -> Option<A>) -> Option<A>;
}

impl<R, A> ContExt<R, A> for Cont<R, A> {
    fn to_either(&self) -> Either<R, A> {
        self.fold(Either::Left, Either::Right)
    }

    fn to_ior(&self) -> Ior<R, A> {
        self.fold(Ior::Left, Ior::Right)
    }

    fn to_validated(&self) -> Validated<R, A> {
        self.fold(Validated::Invalid, Validated::Valid)
    }

    fn to_option(&self, or_else: impl FnOnce(R) -> Option<A>) -> Option<A> {
        self.fold(or_else, Some)
    }
}
