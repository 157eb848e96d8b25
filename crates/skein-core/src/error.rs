//! Shared error types for module lifecycle hooks.
//!
//! Arena and queue subsystems define their own error enums next to their
//! implementations; this module holds only the errors that cross crate
//! boundaries through the `Module` trait.

use std::error::Error;
use std::fmt;

/// Errors returned by module lifecycle hooks (prepare/compute/reduce/finalize).
///
/// The runner converts these into user-visible status messages and moves
/// the module toward idle rather than crashing the process. A failure in
/// the finalize hook is reported but never blocks the return to idle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModuleError {
    /// The hook failed for a module-specific reason.
    ExecutionFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// A required input port is not connected or delivered no object.
    MissingInput {
        /// Name of the port.
        port: String,
    },
    /// A shared-object operation failed inside the hook.
    ObjectUnavailable {
        /// Published name of the object.
        name: String,
    },
}

impl ModuleError {
    /// Convenience constructor for [`ModuleError::ExecutionFailed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionFailed { reason } => write!(f, "execution failed: {reason}"),
            Self::MissingInput { port } => write!(f, "no object on input port '{port}'"),
            Self::ObjectUnavailable { name } => write!(f, "shared object '{name}' unavailable"),
        }
    }
}

impl Error for ModuleError {}
