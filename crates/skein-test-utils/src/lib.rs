//! Test utilities and mock modules for skein development.
//!
//! Provides a small arena fixture plus three standard modules for
//! lifecycle and pipeline testing: [`ConstModule`], [`IdentityModule`],
//! and [`FailingModule`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use skein_arena::{Arena, ArenaConfig};
use skein_core::{ModuleId, ObjectMeta, Rank};

mod fixtures;

pub use fixtures::{ConstModule, FailingModule, IdentityModule};

/// A small single-process arena for tests. `name` keeps concurrent
/// test arenas distinguishable in assertions and logs.
pub fn test_arena(name: &str) -> Arc<Arena> {
    Arena::new(ArenaConfig {
        segment_name: name.to_string(),
        segment_bytes: 256 * 1024,
        max_segments: 4,
    })
    .expect("test arena config is valid")
}

/// Minimal object metadata for rank 0 of a test module.
pub fn test_meta() -> ObjectMeta {
    ObjectMeta::new(Rank(0), ModuleId(1))
}
