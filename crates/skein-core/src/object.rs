//! Object kinds, metadata, and mapping-kind classification.

use indexmap::IndexMap;

use crate::id::{BlockIndex, ModuleId, Rank, Timestep};

/// Classification of a shared object's payload.
///
/// A closed set: every consumption site matches exhaustively rather than
/// performing runtime type tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    /// A rank-1 array of scalar values.
    ScalarArray,
    /// An array of fixed-size vectors.
    VectorArray {
        /// Number of components per element (e.g., 3 for velocity).
        dims: u32,
    },
    /// A geometry object: vertex coordinates plus element topology counts.
    Geometry,
    /// A composite object referencing a geometry and mapped data.
    Container,
}

impl ObjectKind {
    /// Number of f32 storage slots per element for this kind.
    ///
    /// Geometry objects store 3 coordinates per vertex; containers carry
    /// no payload of their own (their children hold the storage).
    pub fn components(&self) -> u32 {
        match self {
            Self::ScalarArray => 1,
            Self::VectorArray { dims } => *dims,
            Self::Geometry => 3,
            Self::Container => 0,
        }
    }

    /// Single-character tag used when deriving object names.
    pub fn tag(&self) -> char {
        match self {
            Self::ScalarArray => 'S',
            Self::VectorArray { .. } => 'V',
            Self::Geometry => 'G',
            Self::Container => 'C',
        }
    }

    /// Derive the canonical published name for an object id.
    ///
    /// Both the module side and an external writer build names through
    /// this function; the synchronized-id handshake keeps their id ranges
    /// disjoint, so derived names never collide across the two sides.
    pub fn derive_name(&self, id: crate::id::ObjectId) -> String {
        format!("{}{:08}", self.tag(), id.0)
    }
}

/// Whether a data array is associated with geometry vertices or elements.
///
/// Resolved lazily by comparing the array length against the owning
/// geometry's vertex and element counts; a tie resolves to `Vertex`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MappingKind {
    /// One value per geometry vertex.
    Vertex,
    /// One value per geometry element (cell).
    Element,
    /// Size matches neither count.
    Unknown,
}

/// Vertex and element counts for a geometry object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeometryInfo {
    /// Number of vertices.
    pub vertices: u32,
    /// Number of elements (cells).
    pub elements: u32,
}

/// Per-object metadata stored alongside the payload.
///
/// Mutated only by the creator until the object is published; thereafter
/// treated as immutable by convention (the lazily-inferred mapping kind is
/// the one exception and is tracked separately by the arena).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Rank of the creating process.
    pub creator_rank: Rank,
    /// Module that created the object.
    pub creator_module: ModuleId,
    /// Timestep the object belongs to; [`Timestep::NONE`] if not
    /// timestep-specific.
    pub timestep: Timestep,
    /// Spatial partition; [`BlockIndex::WHOLE`] for whole-domain data.
    pub block: BlockIndex,
    /// Free-form string attributes, in insertion order.
    pub attributes: IndexMap<String, String>,
    /// Weak back-reference to the owning geometry, by published name.
    ///
    /// Never extends the geometry's lifetime; resolving it may fail if
    /// the geometry has already been released.
    pub grid_name: Option<String>,
    /// Topology counts, present only on geometry objects.
    pub geometry: Option<GeometryInfo>,
}

impl ObjectMeta {
    /// Metadata for an object created by `module` on `rank`, with no
    /// timestep or block association.
    pub fn new(rank: Rank, module: ModuleId) -> Self {
        Self {
            creator_rank: rank,
            creator_module: module,
            timestep: Timestep::NONE,
            block: BlockIndex::WHOLE,
            attributes: IndexMap::new(),
            grid_name: None,
            geometry: None,
        }
    }

    /// Set the timestep, chaining.
    pub fn with_timestep(mut self, t: Timestep) -> Self {
        self.timestep = t;
        self
    }

    /// Set the block index, chaining.
    pub fn with_block(mut self, b: BlockIndex) -> Self {
        self.block = b;
        self
    }

    /// Add a string attribute, chaining.
    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    /// Copy the transferable attributes of `src` onto `self`: timestep,
    /// block, string attributes, and grid back-reference.
    ///
    /// Creator identity and geometry counts are not copied — they belong
    /// to the object itself, not to the data it was derived from.
    pub fn copy_attributes_from(&mut self, src: &ObjectMeta) {
        self.timestep = src.timestep;
        self.block = src.block;
        for (k, v) in &src.attributes {
            self.attributes.insert(k.clone(), v.clone());
        }
        self.grid_name = src.grid_name.clone();
    }
}
