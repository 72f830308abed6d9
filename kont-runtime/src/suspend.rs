//! # Asynchronous Bodies
//!
//! [`reset_async`] is the suspending counterpart of
//! [`reset`](crate::cont::reset). The body receives an owned
//! [`ContEffect`] and returns a future. While that future is pending the
//! activation sits in [`ScopeState::Suspended`](crate::shift::ScopeState);
//! it is back in `Running` whenever it is polled.
//!
//! Dropping a [`ResetFuture`] before it resolves cancels the activation: its
//! frame is marked failed and later shifts through leaked handles panic.
//!
//! No executor is bundled. Any executor that polls `Future`s will do.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::cont::{settle, Exit};
use crate::effect::ContEffect;
use crate::shift::Shifted;

/// Future returned by [`reset_async`].
#[must_use = "futures do nothing unless polled"]
pub struct ResetFuture<R, Fut> {
    effect: ContEffect<R>,
    body: Option<Pin<Box<Fut>>>,
}

/// Install a scope boundary around an asynchronous body.
///
/// Resolves like [`reset`](crate::cont::reset): `Ok(exit)` for a normal
/// completion or an intercepted shift, `Err(signal)` for a shift owned by an
/// enclosing scope.
pub fn reset_async<R, A, F, Fut>(body: F) -> ResetFuture<R, Fut>
where
    F: FnOnce(ContEffect<R>) -> Fut,
    Fut: Future<Output = Result<A, Shifted>>,
{
    let effect = ContEffect::new();
    tracing::trace!(token = %effect.token(), "reset_async");
    let body = Box::pin(body(effect.clone()));
    ResetFuture {
        effect,
        body: Some(body),
    }
}

impl<R, Fut> ResetFuture<R, Fut> {
    /// The effect handle of this activation.
    pub fn effect(&self) -> &ContEffect<R> {
        &self.effect
    }
}

impl<R, A, Fut> Future for ResetFuture<R, Fut>
where
    Fut: Future<Output = Result<A, Shifted>>,
{
    type Output = Result<Exit<R, A>, Shifted>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let body = this
            .body
            .as_mut()
            .expect("ResetFuture polled after completion");

        this.effect.frame().resume();
        match body.as_mut().poll(cx) {
            Poll::Pending => {
                this.effect.frame().suspend();
                Poll::Pending
            }
            Poll::Ready(result) => {
                this.body = None;
                Poll::Ready(settle(&this.effect, result))
            }
        }
    }
}

impl<R, Fut> Drop for ResetFuture<R, Fut> {
    fn drop(&mut self) {
        if !self.effect.state().is_terminal() {
            tracing::debug!(token = %self.effect.token(), "async body dropped before completion");
            self.effect.frame().abandon();
        }
    }
}

impl<R, Fut> fmt::Debug for ResetFuture<R, Fut> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetFuture")
            .field("effect", &self.effect)
            .field("done", &self.body.is_none())
            .finish()
    }
}

/// Run an asynchronous body, recovering a shifted `R` or transforming the value.
///
/// # Panics
/// Panics if a shift owned by another scope reaches this fold, as
/// [`Cont::fold`](crate::cont::Cont::fold) does.
pub async fn fold_async<R, A, B, F, Fut>(
    body: F,
    recover: impl FnOnce(R) -> B,
    transform: impl FnOnce(A) -> B,
) -> B
where
    F: FnOnce(ContEffect<R>) -> Fut,
    Fut: Future<Output = Result<A, Shifted>>,
{
    match try_fold_async(body, recover, transform).await {
        Ok(b) => b,
        Err(foreign) => panic!("{foreign} escaped to a top-level fold"),
    }
}

/// Run an asynchronous body, returning shifts owned by enclosing scopes as `Err`.
pub async fn try_fold_async<R, A, B, F, Fut>(
    body: F,
    recover: impl FnOnce(R) -> B,
    transform: impl FnOnce(A) -> B,
) -> Result<B, Shifted>
where
    F: FnOnce(ContEffect<R>) -> Fut,
    Fut: Future<Output = Result<A, Shifted>>,
{
    reset_async(body)
        .await
        .map(|exit| exit.fold(recover, transform))
}
