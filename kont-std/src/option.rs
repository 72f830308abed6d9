//! The `option` builder.
//!
//! Inside [`option`], `None` short-circuits the whole body. The short-circuit
//! payload is the unit marker [`Absent`].

use std::fmt;
use std::future::Future;

use kont_runtime::{fold_async, reset, Bind, ContEffect, Shifted};

/// Short-circuit payload of an `option` computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Absent;

impl fmt::Display for Absent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("absent")
    }
}

/// Unwraps `Some`, shifts [`Absent`] on `None`.
impl<B> Bind<Absent> for Option<B> {
    type Output = B;

    fn bind(self, effect: &ContEffect<Absent>) -> Result<B, Shifted> {
        match self {
            Some(b) => Ok(b),
            None => effect.shift(Absent),
        }
    }
}

/// Run `body` at once, yielding `None` if it short-circuits.
///
/// # Panics
/// Panics if a shift owned by an enclosing scope escapes the body. Use
/// [`try_option`] when nesting inside another computation.
pub fn option<A, F>(body: F) -> Option<A>
where
    F: FnOnce(&ContEffect<Absent>) -> Result<A, Shifted>,
{
    match try_option(body) {
        Ok(result) => result,
        Err(foreign) => panic!("{foreign} escaped to a top-level option"),
    }
}

/// Like [`option`], returning shifts owned by enclosing scopes as `Err`.
pub fn try_option<A, F>(body: F) -> Result<Option<A>, Shifted>
where
    F: FnOnce(&ContEffect<Absent>) -> Result<A, Shifted>,
{
    reset(body).map(|exit| exit.fold(|Absent| None, Some))
}

/// Asynchronous [`option`].
pub async fn option_async<A, F, Fut>(body: F) -> Option<A>
where
    F: FnOnce(ContEffect<Absent>) -> Fut,
    Fut: Future<Output = Result<A, Shifted>>,
{
    fold_async(body, |Absent| None, Some).await
}
