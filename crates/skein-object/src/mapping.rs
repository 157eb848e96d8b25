//! Weak data→geometry back-references and mapping-kind inference.
//!
//! A data array remembers its owning geometry by published name only.
//! The reference never extends the geometry's lifetime; resolving it may
//! legitimately fail once the geometry has been released.

use std::sync::Arc;

use skein_arena::{Arena, ArenaError, ObjectRef};
use skein_core::MappingKind;

/// Record a weak back-reference from `data` to `grid`.
///
/// Only the grid's published name is stored; the grid's reference count
/// is untouched. Callers that need the grid kept alive must hold a
/// strong reference separately.
///
/// Fails with [`ArenaError::NotFound`] if the grid has not been
/// published — an unnamed grid cannot be re-resolved later.
pub fn set_grid(data: &ObjectRef, grid: &ObjectRef) -> Result<(), ArenaError> {
    let name = grid.name().ok_or(ArenaError::NotFound {
        name: String::new(),
    })?;
    data.update_meta(|meta| meta.grid_name = Some(name));
    Ok(())
}

/// Resolve a data object's grid back-reference to a strong handle.
///
/// Returns [`ArenaError::NotFound`] if no back-reference was recorded or
/// the grid has already been released.
pub fn resolve_grid(arena: &Arc<Arena>, data: &ObjectRef) -> Result<ObjectRef, ArenaError> {
    let name = data.meta().grid_name.ok_or(ArenaError::NotFound {
        name: String::new(),
    })?;
    arena.lookup(&name)
}

/// Classify `data` as per-vertex or per-element for `grid`.
///
/// A pure function of the array length against the grid's vertex and
/// element counts, with the result cached on the data object so repeated
/// calls are idempotent. When the length matches both counts, the tie
/// resolves to [`MappingKind::Vertex`].
pub fn guess_mapping(data: &ObjectRef, grid: &ObjectRef) -> MappingKind {
    if let Some(cached) = data.mapping_hint() {
        return cached;
    }
    let mapping = match grid.meta().geometry {
        Some(info) => {
            let len = data.elements();
            if len == info.vertices {
                MappingKind::Vertex
            } else if len == info.elements {
                MappingKind::Element
            } else {
                MappingKind::Unknown
            }
        }
        None => MappingKind::Unknown,
    };
    data.store_mapping_hint(mapping);
    mapping
}
