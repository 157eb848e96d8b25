//! Core types and traits for the Skein data plane.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions used throughout the Skein workspace:
//! typed IDs, object kinds and metadata, lifecycle messages, and the
//! shared error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod message;
pub mod object;

pub use error::ModuleError;
pub use id::{BlockIndex, ExecutionId, InstanceNumber, ModuleId, ObjectId, Rank, Timestep};
pub use message::{ControlMessage, ExecuteKind, Severity, StatusMessage, TimestepList};
pub use object::{GeometryInfo, MappingKind, ObjectKind, ObjectMeta};
