//! # Kont Runtime Library
//!
//! One-shot delimited continuations with structured concurrency:
//!
//! - **Interpreter**: `reset` installs a scope boundary and recovers either
//!   the body's value or a value shifted out of it
//! - **Computations**: [`Cont<R, A>`], a lazy, refoldable description of a
//!   body that completes with `A` or short-circuits with `R`
//! - **Effect Handle**: [`ContEffect<R>`], the `shift` capability and the
//!   `bind`/`ensure` helpers built on it
//! - **Scopes**: structured concurrency where the first shift cancels siblings
//! - **Async**: suspending bodies via `reset_async`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        KONT RUNTIME                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │    Cont      │  │  ContEffect  │  │   Suspend    │       │
//! │  │  (cont.rs)   │  │ (effect.rs)  │  │ (suspend.rs) │       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! │         │                 │                 │               │
//! │         └─────────────────┼─────────────────┘               │
//! │                           │                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │ Frame/Signal │  │    Scope     │  │ Cancellation │       │
//! │  │  (shift.rs)  │  │  (scope.rs)  │  │  (cancel..)  │       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use kont_runtime::{cont, Cont, ContEffect};
//!
//! let c: Cont<String, i32> = cont(|eff| {
//!     let n = eff.bind_result("7".parse::<i32>(), |e| e.to_string())?;
//!     eff.ensure(n > 10, || format!("{n} is too small"))?;
//!     Ok(n)
//! });
//! assert_eq!(c.to_result(), Err("7 is too small".to_string()));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cancellation;
pub mod config;
pub mod cont;
pub mod effect;
pub mod panic;
pub mod scope;
pub mod shift;
pub mod suspend;
pub mod token;

// Re-exports
pub use cancellation::{CancellationError, CancellationSource, CancellationToken};
pub use config::{ConfigError, RuntimeConfig, RuntimeConfigBuilder, ScopeConfig, TieBreak};
pub use cont::{cont, reset, sequence, traverse, Cont, Exit};
pub use effect::{Bind, ContEffect};
pub use panic::{catch_panic, CaughtPanic};
pub use scope::{scope, scope_with, ChildContext, ChildHandle, Scope};
pub use shift::{ScopeState, Shifted};
pub use suspend::{fold_async, reset_async, try_fold_async, ResetFuture};
pub use token::Token;

/// Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Global runtime configuration.
static RUNTIME_CONFIG: std::sync::OnceLock<RuntimeConfig> = std::sync::OnceLock::new();

/// Install the process-wide runtime configuration.
///
/// Only the first call takes effect; later calls return `false` and leave
/// the installed configuration untouched.
///
/// # Example
///
/// ```rust,ignore
/// use kont_runtime::{init_with_config, RuntimeConfig, TieBreak};
///
/// let config = RuntimeConfig::builder()
///     .tie_break(TieBreak::LeftmostChild)
///     .build()
///     .unwrap();
///
/// init_with_config(config);
/// ```
pub fn init_with_config(config: RuntimeConfig) -> bool {
    let tie_break = config.scope.tie_break;
    let installed = RUNTIME_CONFIG.set(config).is_ok();
    if installed {
        tracing::debug!(%tie_break, "runtime configured");
    } else {
        tracing::warn!("runtime already configured; ignoring new configuration");
    }
    installed
}

/// Initialize the runtime from `KONT_*` environment variables.
///
/// See [`RuntimeConfig::from_env`] for the supported variables.
pub fn init_from_env() -> Result<bool, ConfigError> {
    let config = RuntimeConfig::from_env()?;
    Ok(init_with_config(config))
}

/// Get the current runtime configuration.
///
/// Returns `None` if neither [`init_with_config`] nor [`init_from_env`] ran.
/// Scopes then use [`ScopeConfig::default`].
pub fn runtime_config() -> Option<&'static RuntimeConfig> {
    RUNTIME_CONFIG.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_reexports_compose() {
        let c: Cont<String, i32> = cont(|eff: &ContEffect<String>| {
            let n = eff.bind_result("7".parse::<i32>(), |e| e.to_string())?;
            eff.ensure(n > 10, || format!("{n} is too small"))?;
            Ok(n)
        });
        assert_eq!(c.to_result(), Err("7 is too small".to_string()));
    }
}
