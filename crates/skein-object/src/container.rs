//! Composite container objects: a geometry plus mapped data.

use std::sync::Arc;

use skein_arena::{Arena, ArenaError, ObjectRef};
use skein_core::{ObjectKind, ObjectMeta};

/// A composite object holding strong references to a geometry and zero
/// or more mapped-data objects.
///
/// The container itself is a zero-payload arena object whose attributes
/// record the child names; the strong references live in this handle, so
/// the children stay alive for as long as any holder of the container
/// does. Dropping the container releases the children.
pub struct Container {
    object: ObjectRef,
    geometry: ObjectRef,
    mapped: Vec<ObjectRef>,
}

impl Container {
    /// Build a container over a published geometry and published data
    /// objects, acquiring a strong reference to each.
    pub fn new(
        arena: &Arc<Arena>,
        geometry: &ObjectRef,
        mapped: &[&ObjectRef],
        mut meta: ObjectMeta,
    ) -> Result<Self, ArenaError> {
        let grid_name = geometry.name().ok_or(ArenaError::NotFound {
            name: String::new(),
        })?;
        meta.attributes.insert("grid".to_string(), grid_name);
        for (i, data) in mapped.iter().enumerate() {
            let name = data.name().ok_or(ArenaError::NotFound {
                name: String::new(),
            })?;
            meta.attributes.insert(format!("data{i}"), name);
        }
        let object = arena.allocate(ObjectKind::Container, 0, meta)?;
        Ok(Self {
            object,
            geometry: geometry.clone(),
            mapped: mapped.iter().map(|r| (*r).clone()).collect(),
        })
    }

    /// The container's own arena object.
    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    /// The referenced geometry.
    pub fn geometry(&self) -> &ObjectRef {
        &self.geometry
    }

    /// The referenced mapped-data objects.
    pub fn mapped(&self) -> &[ObjectRef] {
        &self.mapped
    }

    /// Publish the container object under `name`.
    pub fn publish(&self, name: &str) -> Result<(), ArenaError> {
        self.object.publish(name)
    }
}
