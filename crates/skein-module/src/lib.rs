//! Module lifecycle: the `Module` trait, the execution state machine,
//! reduce policies, ports, and the per-rank runner thread.
//!
//! ```text
//!   coordinator                       runner thread (one per rank)
//!       │  Execute / Cancel /           ┌──────────────────────────┐
//!       │  Shutdown (bounded chan)      │ drain control channel    │
//!       ├──────────────────────────────▶│ prepare → compute* →     │
//!       │                               │ reduce (per policy)      │
//!       │◀── StatusMessage stream ──────│ poll in-situ mailbox     │
//!       │                               └──────────────────────────┘
//!       │◀── PhaseCell (atomic) ────────  Idle / Preparing /
//!                                         Executing / Reducing
//! ```
//!
//! Modules implement [`Module`] and never touch threads, channels, or
//! collectives directly; the runner funnels every execution path into
//! the same reduction calls so no rank can skip a collective its peers
//! entered.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod config;
mod module;
mod ports;
mod reduce;
mod runner;
mod state;

pub use config::{ConfigError, RunnerConfig};
pub use module::{ComputeContext, ComputeTask, Module};
pub use ports::PortSet;
pub use reduce::{Collective, LocalCollective, ReducePolicy};
pub use runner::{spawn, InSituEvent, ModuleHandle};
pub use state::{ExecutionState, Phase, PhaseCell};
