//! Arena-specific error types.

use std::error::Error;
use std::fmt;

/// Errors that can occur during arena operations.
///
/// Allocation and lookup failures always propagate synchronously to the
/// caller as values; they are never converted into panics. Releasing an
/// unknown handle, by contrast, indicates a broken ownership contract and
/// is treated as fatal (assertion) rather than a recoverable condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// The segment pool cannot satisfy the allocation.
    ///
    /// Segments are fixed-size; the pool grows by whole segments up to a
    /// configured cap, never by resizing an existing one.
    OutOfMemory {
        /// Number of bytes requested.
        requested: usize,
        /// Total capacity across all segments.
        capacity: usize,
    },
    /// The name is already registered and still referenced.
    NameCollision {
        /// The contested name.
        name: String,
    },
    /// No published object carries this name.
    NotFound {
        /// The name that was looked up.
        name: String,
    },
    /// The arena configuration is invalid.
    InvalidConfig {
        /// Description of which invariant was violated.
        reason: String,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory {
                requested,
                capacity,
            } => write!(
                f,
                "arena out of memory: requested {requested} bytes, capacity {capacity} bytes"
            ),
            Self::NameCollision { name } => {
                write!(f, "name '{name}' is already registered and referenced")
            }
            Self::NotFound { name } => write!(f, "no object named '{name}'"),
            Self::InvalidConfig { reason } => write!(f, "invalid arena config: {reason}"),
        }
    }
}

impl Error for ArenaError {}
