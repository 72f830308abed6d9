//! Scope identity tokens.
//!
//! Every activation of the interpreter mints exactly one [`Token`]. A
//! [`Shifted`](crate::shift::Shifted) signal carries the token of the frame
//! that raised it, and a frame only intercepts signals whose token is its own.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of one interpreter activation.
///
/// Tokens are compared by value, but values are drawn from a global
/// monotonically increasing counter, so two activations never share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(u64);

impl Token {
    /// Get the raw token value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:x})", self.0)
    }
}

/// Global token counter.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Mint a fresh token.
pub(crate) fn next_token() -> Token {
    Token(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
}
