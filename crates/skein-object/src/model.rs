//! Allocation helpers and deep cloning for typed shared objects.

use std::sync::Arc;

use skein_arena::{Arena, ArenaError, ObjectRef};
use skein_core::{GeometryInfo, ObjectKind, ObjectMeta};

/// Allocate a rank-1 scalar array of `len` elements.
pub fn alloc_scalar_array(
    arena: &Arc<Arena>,
    len: u32,
    meta: ObjectMeta,
) -> Result<ObjectRef, ArenaError> {
    arena.allocate(ObjectKind::ScalarArray, len, meta)
}

/// Allocate an array of `len` vectors with `dims` components each.
pub fn alloc_vector_array(
    arena: &Arc<Arena>,
    dims: u32,
    len: u32,
    meta: ObjectMeta,
) -> Result<ObjectRef, ArenaError> {
    arena.allocate(ObjectKind::VectorArray { dims }, len, meta)
}

/// Allocate a geometry object with the given topology counts.
///
/// The payload holds 3 coordinates per vertex; element connectivity is
/// the business of the file codecs and algorithm modules, which are
/// external collaborators — the data plane carries only the counts they
/// need for mapping classification.
pub fn alloc_geometry(
    arena: &Arc<Arena>,
    info: GeometryInfo,
    mut meta: ObjectMeta,
) -> Result<ObjectRef, ArenaError> {
    meta.geometry = Some(info);
    arena.allocate(ObjectKind::Geometry, info.vertices, meta)
}

/// Deep-copy an object: backing storage and attributes, but not the
/// reference graph.
///
/// The clone starts with reference count 1, no dependents, no published
/// name, and no grid back-reference. The caller publishes it under a
/// fresh name if it is meant to be shared.
pub fn clone_object(arena: &Arc<Arena>, src: &ObjectRef) -> Result<ObjectRef, ArenaError> {
    let mut meta = src.meta();
    meta.grid_name = None;
    let copy = arena.allocate(src.kind(), src.elements(), meta)?;
    copy.write().copy_from_slice(&src.read());
    Ok(copy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_arena::ArenaConfig;
    use skein_core::{BlockIndex, ModuleId, Rank, Timestep};

    fn test_arena() -> Arc<Arena> {
        Arena::new(ArenaConfig {
            segment_name: "object-test".into(),
            segment_bytes: 16 * 1024,
            max_segments: 2,
        })
        .unwrap()
    }

    fn meta() -> ObjectMeta {
        ObjectMeta::new(Rank(0), ModuleId(1))
    }

    #[test]
    fn geometry_records_topology_counts() {
        let arena = test_arena();
        let info = GeometryInfo {
            vertices: 8,
            elements: 6,
        };
        let grid = alloc_geometry(&arena, info, meta()).unwrap();
        assert_eq!(grid.meta().geometry, Some(info));
        assert_eq!(grid.read().len(), 24); // 3 coords per vertex
    }

    #[test]
    fn clone_copies_storage_and_attributes() {
        let arena = test_arena();
        let src = alloc_scalar_array(
            &arena,
            4,
            meta()
                .with_timestep(Timestep(2))
                .with_block(BlockIndex(1))
                .with_attribute("unit", "K"),
        )
        .unwrap();
        src.write().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        src.publish("orig").unwrap();

        let copy = clone_object(&arena, &src).unwrap();
        assert_eq!(&*copy.read(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(copy.meta().timestep, Timestep(2));
        assert_eq!(copy.meta().block, BlockIndex(1));
        assert_eq!(
            copy.meta().attributes.get("unit").map(String::as_str),
            Some("K")
        );
        assert_ne!(copy.id(), src.id());
        assert_eq!(copy.ref_count(), 1);
        assert_eq!(copy.name(), None);
    }

    #[test]
    fn clone_is_independent_of_source() {
        let arena = test_arena();
        let src = alloc_scalar_array(&arena, 2, meta()).unwrap();
        src.write().copy_from_slice(&[5.0, 6.0]);
        let copy = clone_object(&arena, &src).unwrap();
        drop(src);
        assert_eq!(&*copy.read(), &[5.0, 6.0]);
    }

    #[test]
    fn clone_completes_while_the_source_is_being_read() {
        let arena = test_arena();
        let src = alloc_scalar_array(&arena, 3, meta()).unwrap();
        src.write().copy_from_slice(&[9.0, 8.0, 7.0]);

        // A reader of the source must not stall the copy: the clone
        // takes a shared guard on the source and an exclusive guard on
        // the new object, which is still private to this call.
        let reader = src.read();
        let copy = clone_object(&arena, &src).unwrap();
        assert_eq!(&*copy.read(), &*reader);
    }

    #[test]
    fn clone_drops_grid_back_reference() {
        let arena = test_arena();
        let src = alloc_scalar_array(&arena, 2, meta()).unwrap();
        src.update_meta(|m| m.grid_name = Some("G1".into()));
        let copy = clone_object(&arena, &src).unwrap();
        assert_eq!(copy.meta().grid_name, None);
    }
}
