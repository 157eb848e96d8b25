//! Shared object model for the Skein data plane.
//!
//! Builds the typed containers of the pipeline — scalar and vector
//! arrays, geometry, and composite containers — on top of the arena's
//! reference-counted storage. Provides deep cloning, attribute
//! propagation, the weak data→geometry back-reference, and lazy
//! mapping-kind inference.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod container;
pub mod mapping;
pub mod model;

pub use container::Container;
pub use mapping::{guess_mapping, resolve_grid, set_grid};
pub use model::{alloc_geometry, alloc_scalar_array, alloc_vector_array, clone_object};
