//! Runtime error type shared across the crate.
//!
//! fen distinguishes two failure tiers. Language-visible runtime errors are
//! values of [`Fault`]: they unwind the current call frame and may be caught
//! by a `catch` construct. Programming errors (a pseudo value escaping into
//! `hash`, `eql`, or `dump`) are panics and are never caught.

use thiserror::Error;

/// A language-visible runtime error.
///
/// Raised by the protocol operations (`get`, `set`, `cast`, `next`, the
/// bridge conversions) with a message in the `"op: expected X, got Y"`
/// register. `OutOfMemory` travels the same unwind path but is refused by
/// [`crate::vm::Vm::error_value`], so the language cannot catch it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("{0}")]
    Runtime(Box<str>),
    #[error("out of memory")]
    OutOfMemory,
}

impl Fault {
    pub fn runtime(msg: impl Into<String>) -> Fault {
        Fault::Runtime(msg.into().into_boxed_str())
    }

    /// Whether a `catch` construct may convert this fault into an `err` value.
    pub fn is_catchable(&self) -> bool {
        !matches!(self, Fault::OutOfMemory)
    }

    /// The message a caught fault surfaces to the language.
    pub fn message(&self) -> &str {
        match self {
            Fault::Runtime(msg) => msg,
            Fault::OutOfMemory => "out of memory",
        }
    }
}

pub type Result<T> = std::result::Result<T, Fault>;
