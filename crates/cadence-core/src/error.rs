//! Error types for the core scheduling building blocks.
//!
//! One enum per subsystem: time arithmetic, event execution, and the
//! naming context. Kernel-level errors (lifecycle, scheduling windows)
//! live in the engine crate and wrap these where subsystems nest.

use std::error::Error;
use std::fmt;

/// Errors from logical-time arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeError {
    /// Adding a delta overflowed the time representation.
    Overflow,
}

impl fmt::Display for TimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow => write!(f, "time arithmetic overflow"),
        }
    }
}

impl Error for TimeError {}

/// Errors from scheduled-event execution.
///
/// `Failed` is the carrier for model-action faults: an event action that
/// cannot complete returns it, and the kernel routes it through the
/// configured error strategy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventError {
    /// The event was already executed once.
    AlreadyExecuted,
    /// The bound action failed.
    Failed {
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl EventError {
    /// Shorthand for [`EventError::Failed`] from any displayable reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExecuted => write!(f, "event was already executed"),
            Self::Failed { reason } => write!(f, "event action failed: {reason}"),
        }
    }
}

impl Error for EventError {}

/// Errors from the hierarchical naming context.
///
/// Binding failures are non-fatal by contract: callers log them and
/// continue, the simulation never aborts on a context error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContextError {
    /// The name is already bound in this context.
    AlreadyBound {
        /// The conflicting name.
        name: String,
    },
    /// A path component names a bound object, not a sub-context.
    NotAContext {
        /// The offending path component.
        name: String,
    },
    /// The name is empty or contains a path separator.
    InvalidName {
        /// The rejected name.
        name: String,
    },
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyBound { name } => write!(f, "name '{name}' is already bound"),
            Self::NotAContext { name } => {
                write!(f, "'{name}' is a bound object, not a sub-context")
            }
            Self::InvalidName { name } => write!(f, "invalid name '{name}'"),
        }
    }
}

impl Error for ContextError {}
