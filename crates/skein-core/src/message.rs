//! Lifecycle and status message types exchanged with the coordinator.

use smallvec::SmallVec;

use crate::id::{ExecutionId, ModuleId, Rank, Timestep};

/// Timesteps requested for one execution.
///
/// Inline storage covers typical short timestep batches; longer runs
/// spill to the heap transparently.
pub type TimestepList = SmallVec<[Timestep; 8]>;

/// What an `Execute` request asks the module to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecuteKind {
    /// Run the prepare hook only.
    Prepare,
    /// Run prepare, then compute over the requested timesteps, then reduce.
    ComputeExecute,
}

/// A lifecycle message from the coordinator to a module replica.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlMessage {
    /// Begin a new top-level execution.
    Execute {
        /// Prepare-only or full compute execution.
        what: ExecuteKind,
        /// The execution this request belongs to. Monotonic; a replica
        /// never observes the same execution ID twice.
        execution: ExecutionId,
        /// Timesteps to process. Empty means a single non-timestep pass.
        timesteps: TimestepList,
    },
    /// Cancel the current execution: finish the pending boundary's
    /// collective work, run the finalize hook, then return to idle.
    CancelExecute,
    /// Shut the module replica down. The runner exits its event loop.
    Shutdown,
}

/// Severity of a status message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational.
    Info,
    /// Something unexpected, execution continues.
    Warning,
    /// An operation failed.
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A textual status event routed to the coordinator for display.
///
/// Observational only: status messages never alter control flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusMessage {
    /// The module that emitted the message.
    pub module: ModuleId,
    /// The rank it was emitted on.
    pub rank: Rank,
    /// Message severity.
    pub severity: Severity,
    /// Human-readable text.
    pub text: String,
}

impl StatusMessage {
    /// Build an informational message.
    pub fn info(module: ModuleId, rank: Rank, text: impl Into<String>) -> Self {
        Self {
            module,
            rank,
            severity: Severity::Info,
            text: text.into(),
        }
    }

    /// Build a warning.
    pub fn warning(module: ModuleId, rank: Rank, text: impl Into<String>) -> Self {
        Self {
            module,
            rank,
            severity: Severity::Warning,
            text: text.into(),
        }
    }

    /// Build an error message.
    pub fn error(module: ModuleId, rank: Rank, text: impl Into<String>) -> Self {
        Self {
            module,
            rank,
            severity: Severity::Error,
            text: text.into(),
        }
    }
}

impl std::fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[module {} rank {}] {}: {}",
            self.module, self.rank, self.severity, self.text
        )
    }
}
