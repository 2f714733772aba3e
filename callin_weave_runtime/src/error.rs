//! Host-level error types
//!
//! These are the exceptions raised by woven role methods, lift methods or
//! original base methods. The weaving engine never inspects or rewraps them;
//! it hands them back to the caller of the dispatch unchanged.

use thiserror::Error;

use crate::symbol::Symbol;
use crate::value::Value;

/// Exception raised by host code during a woven call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    /// A typed exception thrown by host code
    #[error("{class}: {message}")]
    Thrown {
        /// Exception class
        class: Symbol,
        /// Exception message
        message: String,
    },

    /// Method invoked on a null receiver
    #[error("NullPointerException: {0}")]
    NullReceiver(String),

    /// Argument did not match the callee's declared parameter types
    #[error("IllegalArgumentException: expected {expected}, got {got}")]
    ArgumentMismatch {
        /// Declared parameter type
        expected: String,
        /// Type of the supplied value
        got: String,
    },

    /// Exception carrying an arbitrary thrown value
    #[error("uncaught exception: {0}")]
    Value(Value),

    /// Generic error with custom message
    #[error("{0}")]
    Custom(String),
}

impl HostError {
    /// Create a thrown exception
    pub fn thrown<C: Into<Symbol>, S: Into<String>>(class: C, message: S) -> Self {
        HostError::Thrown {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Create a null receiver error
    pub fn null_receiver<S: Into<String>>(method: S) -> Self {
        HostError::NullReceiver(method.into())
    }

    /// Create an argument mismatch error
    pub fn argument_mismatch<S1: Into<String>, S2: Into<String>>(expected: S1, got: S2) -> Self {
        HostError::ArgumentMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Create a custom error
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        HostError::Custom(msg.into())
    }
}

/// Result type alias for host calls
pub type HostResult<T> = Result<T, HostError>;
