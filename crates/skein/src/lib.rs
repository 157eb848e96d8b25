//! Skein: a distributed shared-data plane and execution coordinator
//! for scientific post-processing pipelines.
//!
//! This is the top-level facade crate that re-exports the public API
//! from all skein sub-crates. For most users, adding `skein` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use skein::prelude::*;
//! use std::sync::Arc;
//!
//! // A minimal module that publishes a constant field. It holds a
//! // reference to its latest result so consumers can look it up.
//! struct Doubler { kept: Option<ObjectRef> }
//! impl Module for Doubler {
//!     fn name(&self) -> &str { "doubler" }
//!     fn compute(&mut self, ctx: &mut ComputeContext, task: &ComputeTask)
//!         -> Result<(), ModuleError>
//!     {
//!         let meta = ObjectMeta::new(ctx.rank(), ctx.module_id())
//!             .with_timestep(task.timestep);
//!         let out = ctx.arena()
//!             .allocate(ObjectKind::ScalarArray, 4, meta)
//!             .map_err(|e| ModuleError::failed(e.to_string()))?;
//!         out.write().fill(2.0);
//!         out.publish("result")
//!             .map_err(|e| ModuleError::failed(e.to_string()))?;
//!         self.kept = Some(out);
//!         Ok(())
//!     }
//! }
//!
//! // One rank, one replica.
//! let arena = Arena::new(ArenaConfig {
//!     segment_name: "quickstart".into(),
//!     segment_bytes: 64 * 1024,
//!     max_segments: 2,
//! }).unwrap();
//! let mut group = LocalCollective::group(1);
//! let handle = skein::module::spawn(
//!     Box::new(Doubler { kept: None }),
//!     Arc::clone(&arena),
//!     ModuleId(1),
//!     PortSet::new(),
//!     Arc::new(group.remove(0)),
//!     None,
//!     RunnerConfig::default(),
//! ).unwrap();
//!
//! handle.execute(ExecutionId(1), TimestepList::new());
//! let done = handle.status().recv().unwrap();
//! assert!(done.text.contains("finished"));
//!
//! let data = arena.lookup("result").unwrap();
//! assert_eq!(&*data.read(), &[2.0; 4]);
//! handle.join();
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in
//! the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`arena`] | `skein-arena` | Shared-memory arena, refcounted handles, name directory |
//! | [`types`] | `skein-core` | IDs, object metadata, lifecycle messages, errors |
//! | [`object`] | `skein-object` | Typed allocation, deep clone, grid mapping, containers |
//! | [`cache`] | `skein-cache` | Per-module result cache with exclusive builds |
//! | [`module`] | `skein-module` | Module trait, state machine, reduce policies, runner |
//! | [`queue`] | `skein-queue` | Mailboxes, id-range handshake, in-situ connect protocol |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Shared-memory arena and refcounted object handles (`skein-arena`).
///
/// Most users only need [`arena::Arena`] and [`arena::ObjectRef`] from
/// this module — they are also available in the [`prelude`].
pub use skein_arena as arena;

/// Core types, IDs, and lifecycle messages (`skein-core`).
///
/// Contains object kinds and metadata, execution and module IDs,
/// control and status messages, and [`types::ModuleError`].
pub use skein_core as types;

/// Typed object model on top of the arena (`skein-object`).
///
/// Allocation helpers, [`object::clone_object`], weak data→geometry
/// references, mapping inference, and composite containers.
pub use skein_object as object;

/// Per-module result cache (`skein-cache`).
///
/// [`cache::ResultCache`] guarantees at most one concurrent build per
/// artifact key.
pub use skein_cache as cache;

/// Module lifecycle and the per-rank runner (`skein-module`).
///
/// The [`module::Module`] trait is the main extension point for
/// user-defined processing stages.
pub use skein_module as module;

/// Inter-process coupling substrate (`skein-queue`).
///
/// Named mailboxes, the synchronized-id-range handshake, and the
/// in-situ connect protocol for live simulations.
pub use skein_queue as queue;

/// Common imports for typical skein usage.
///
/// ```rust
/// use skein::prelude::*;
/// ```
pub mod prelude {
    // Arena
    pub use skein_arena::{Arena, ArenaConfig, ArenaError, ObjectRef};

    // Core types
    pub use skein_core::{
        BlockIndex, ExecutionId, GeometryInfo, MappingKind, ModuleError, ModuleId, ObjectKind,
        ObjectMeta, Rank, Severity, StatusMessage, Timestep, TimestepList,
    };

    // Object model
    pub use skein_object::{
        alloc_geometry, alloc_scalar_array, alloc_vector_array, clone_object, guess_mapping,
        Container,
    };

    // Cache
    pub use skein_cache::{CacheLookup, ResultCache};

    // Module lifecycle
    pub use skein_module::{
        Collective, ComputeContext, ComputeTask, LocalCollective, Module, ModuleHandle, Phase,
        PortSet, ReducePolicy, RunnerConfig,
    };

    // Coupling
    pub use skein_queue::{IdRangeGrant, Mailbox, QueueError, QueueRegistry};
}
