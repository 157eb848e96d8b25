//! Shared-memory style object arena for the Skein data plane.
//!
//! One [`Arena`] exists per process group member. It owns a pool of
//! fixed-size segments with a recycling allocator and a name-indexed
//! directory of published objects:
//!
//! ```text
//! Arena (one per process, passed explicitly — no global singleton)
//! ├── SegmentPool → Segment[] (capacity ledger: bump + free list)
//! ├── slot table  (ObjectId, kind, refcount, payload storage, meta)
//! └── directory   (published name → slot, IndexMap)
//! ```
//!
//! # Ownership
//!
//! Every live handle is an [`ObjectRef`]: cloning adds a reference,
//! dropping releases one, and the release that reaches zero destroys the
//! payload in place and removes the directory entry. A name becomes
//! reusable only after that point.
//!
//! # Concurrency
//!
//! Published objects may be read by any number of threads concurrently.
//! Each object's payload sits behind its own `RwLock`, so a writer
//! excludes only readers of that same object; mutation of a published
//! object by anyone other than its creator remains forbidden by
//! convention. Reference counts are atomic, so `publish` results are
//! visible the moment it returns.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod arena;
pub mod config;
pub mod error;
pub mod segment;

pub use arena::{Arena, ArenaMetrics, DataRead, DataWrite, ObjectRef};
pub use config::ArenaConfig;
pub use error::ArenaError;
