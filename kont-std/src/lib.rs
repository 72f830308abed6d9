//! # Kont Standard Builders
//!
//! Computation builders layered on `kont-runtime`. Each one fixes the
//! short-circuit type of a [`Cont`](kont_runtime::Cont) to a particular shape:
//!
//! - [`either`]: short-circuits with `E`, yields [`Either<E, A>`]
//! - [`option`]: short-circuits with [`Absent`], yields `Option<A>`
//! - [`ior`]: accumulates left values with a combine function, yields
//!   [`Ior<E, A>`]
//!
//! Every builder has an async counterpart, and [`ContExt`] converts any
//! `Cont` into these wrapper types.
//!
//! ```rust,ignore
//! use kont_std::{either, Either, Validated};
//!
//! let res: Either<String, u32> = either(|eff| {
//!     let age = eff.bind(Validated::Valid(30))?;
//!     eff.ensure(age >= 18, || "minor".to_string())?;
//!     Ok(age)
//! });
//! assert_eq!(res, Either::Right(30));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod either;
pub mod ext;
pub mod ior;
pub mod option;
pub mod semigroup;
pub mod validated;

pub use either::{either, either_async, try_either, try_either_async, Either};
pub use ext::ContExt;
pub use ior::{ior, ior_async, ior_semigroup, try_ior, Accumulator, Ior, IorEffect};
pub use option::{option, option_async, try_option, Absent};
pub use semigroup::Semigroup;
pub use validated::Validated;

/// Builder library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_compose() {
        let res: Either<String, u32> = either(|eff| {
            let age = eff.bind(Validated::Valid(30))?;
            eff.ensure(age >= 18, || "minor".to_string())?;
            let nickname = try_option(|opt| opt.bind(None::<&str>))?;
            Ok(age + nickname.map_or(0, |n| n.len() as u32))
        });
        assert_eq!(res, Either::Right(30));
    }
}
