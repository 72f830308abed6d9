//! Runtime Configuration
//!
//! Configuration for structured-concurrency scopes. It can be set
//! programmatically or loaded from environment variables.
//!
//! # Environment Variables
//!
//! All environment variables use the `KONT_` prefix:
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `KONT_TIE_BREAK` | Which concurrent shift wins: `first` or `leftmost` | first |
//! | `KONT_THREAD_NAME` | Name prefix for child threads | kont-child |
//! | `KONT_CHILD_STACK_SIZE` | Child thread stack size in bytes (0 = platform default) | 0 |
//!
//! # Example
//!
//! ```rust,ignore
//! use kont_runtime::config::{RuntimeConfig, TieBreak};
//!
//! // Load from environment with defaults
//! let config = RuntimeConfig::from_env()?;
//!
//! // Or use the builder pattern
//! let config = RuntimeConfig::builder()
//!     .tie_break(TieBreak::LeftmostChild)
//!     .child_stack_size(256 * 1024)
//!     .build()?;
//! ```

use std::env;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Which signal surfaces when several children of one scope shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TieBreak {
    /// Among child shifts, the one that completed first wins.
    ///
    /// A shift returned by the scope body itself always takes precedence.
    #[default]
    FirstObserved,
    /// The shift of the earliest spawned child wins, regardless of timing.
    LeftmostChild,
}

impl TieBreak {
    /// Convert to the string accepted by `KONT_TIE_BREAK`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TieBreak::FirstObserved => "first",
            TieBreak::LeftmostChild => "leftmost",
        }
    }
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TieBreak {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" | "first-observed" | "race" => Ok(TieBreak::FirstObserved),
            "leftmost" | "leftmost-child" | "ordered" => Ok(TieBreak::LeftmostChild),
            _ => Err(ConfigError::InvalidValue {
                var: "KONT_TIE_BREAK",
                value: s.to_string(),
            }),
        }
    }
}

/// Scope configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeConfig {
    /// Tie-break policy for concurrent shifts.
    /// Default: first observed.
    pub tie_break: TieBreak,

    /// Prefix for child thread names; the child index is appended.
    /// Default: "kont-child".
    pub thread_name_prefix: String,

    /// Stack size for child threads in bytes.
    /// None means the platform default.
    pub stack_size: Option<usize>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            tie_break: TieBreak::default(),
            thread_name_prefix: "kont-child".to_string(),
            stack_size: None,
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Scope configuration.
    pub scope: ScopeConfig,
}

impl RuntimeConfig {
    /// Create a builder for runtime configuration.
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::new()
    }

    /// Load configuration from environment variables, using defaults for
    /// variables that are unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = env::var("KONT_TIE_BREAK") {
            config.scope.tie_break = val.parse()?;
        }

        if let Ok(val) = env::var("KONT_THREAD_NAME") {
            if val.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    var: "KONT_THREAD_NAME",
                    value: val,
                });
            }
            config.scope.thread_name_prefix = val;
        }

        if let Ok(val) = env::var("KONT_CHILD_STACK_SIZE") {
            let size: usize = val.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: "KONT_CHILD_STACK_SIZE",
                value: val.clone(),
            })?;
            config.scope.stack_size = (size > 0).then_some(size);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(size) = self.scope.stack_size {
            if size < MIN_STACK_SIZE {
                return Err(ConfigError::StackTooSmall {
                    size,
                    min: MIN_STACK_SIZE,
                });
            }
        }
        Ok(())
    }
}

/// Smallest accepted child stack size.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Builder for runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tie-break policy.
    pub fn tie_break(mut self, tie_break: TieBreak) -> Self {
        self.config.scope.tie_break = tie_break;
        self
    }

    /// Set the child thread name prefix.
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.scope.thread_name_prefix = prefix.into();
        self
    }

    /// Set the child thread stack size.
    pub fn child_stack_size(mut self, size: usize) -> Self {
        self.config.scope.stack_size = Some(size);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<RuntimeConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value {value:?} for {var}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
    /// The child stack size is below the accepted minimum.
    #[error("child stack size {size} is below the minimum of {min} bytes")]
    StackTooSmall {
        /// Requested size.
        size: usize,
        /// Minimum size.
        min: usize,
    },
}
