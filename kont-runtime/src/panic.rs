//! Panic capture
//!
//! Panics raised inside a computation body are genuine faults and are never
//! turned into a short-circuit. The few places that deliberately fold them
//! into a value (`Cont::attempt`, `Cont::fold_catching`) go through
//! [`catch_panic`], which turns the payload into a [`CaughtPanic`].

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe, UnwindSafe};

use thiserror::Error;

/// A panic captured from a computation body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("computation panicked: {message}")]
pub struct CaughtPanic {
    message: String,
    thread_name: Option<String>,
}

impl CaughtPanic {
    /// Build from a raw unwind payload, on the current thread.
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };

        Self {
            message,
            thread_name: std::thread::current().name().map(|s| s.to_string()),
        }
    }

    /// The panic message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Name of the thread the panic was caught on.
    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }
}

/// Catch a panic from `f`.
pub fn catch_panic<F, T>(f: F) -> Result<T, CaughtPanic>
where
    F: FnOnce() -> T + UnwindSafe,
{
    catch_unwind(f).map_err(|payload| CaughtPanic::from_payload(payload.as_ref()))
}

/// Catch a panic from a closure that is not statically unwind-safe.
///
/// Frames abandoned by the unwind are marked failed by their own guards, so
/// the interpreter state stays consistent.
pub fn catch_panic_unchecked<F, T>(f: F) -> Result<T, CaughtPanic>
where
    F: FnOnce() -> T,
{
    catch_panic(AssertUnwindSafe(f))
}
