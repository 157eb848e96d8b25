//! The arena proper: slot table, name directory, and the [`ObjectRef`]
//! RAII guard.
//!
//! Reference counts are atomic and live alongside each slot, so cloning
//! and dropping handles contend only on the reader side of the state
//! lock. The release that brings a count to zero takes the write lock,
//! reclaims the payload's capacity, and removes the directory entry —
//! after that point a lookup of the name reports `NotFound` and the
//! name may be reused.
//!
//! Payload storage is per object, behind that object's own `RwLock`:
//! readers and writers of one object never touch the arena state lock,
//! and never block access to any other object.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use skein_core::{MappingKind, ObjectId, ObjectKind, ObjectMeta};

use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::segment::{PayloadLocation, SegmentPool};

// Mapping-hint encoding for the per-slot atomic.
const MAPPING_UNSET: u8 = 0;
const MAPPING_VERTEX: u8 = 1;
const MAPPING_ELEMENT: u8 = 2;
const MAPPING_UNKNOWN: u8 = 3;

/// One live object: payload, capacity reservation, metadata, and its
/// reference count.
struct Slot {
    id: ObjectId,
    kind: ObjectKind,
    /// Logical length in elements (not f32 slots).
    elements: u32,
    /// Capacity reservation in the segment pool.
    location: PayloadLocation,
    storage: Arc<RwLock<Vec<f32>>>,
    refs: AtomicU32,
    /// Lazily-inferred mapping kind. The only post-publish mutation the
    /// object model permits, hence atomic rather than under `meta`.
    mapping: AtomicU8,
    name: Option<String>,
    meta: ObjectMeta,
}

enum SlotEntry {
    Vacant,
    Occupied(Slot),
}

impl SlotEntry {
    fn occupied(&self) -> Option<&Slot> {
        match self {
            Self::Occupied(slot) => Some(slot),
            Self::Vacant => None,
        }
    }

    fn occupied_mut(&mut self) -> Option<&mut Slot> {
        match self {
            Self::Occupied(slot) => Some(slot),
            Self::Vacant => None,
        }
    }
}

struct ArenaState {
    pool: SegmentPool,
    slots: Vec<SlotEntry>,
    free_slots: Vec<u32>,
    directory: IndexMap<String, u32>,
}

/// Usage metrics for diagnostics and status reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaMetrics {
    /// Reserved capacity across all segments, in bytes.
    pub memory_bytes: usize,
    /// Live (referenced) objects.
    pub object_count: usize,
    /// Segments currently allocated.
    pub segment_count: usize,
}

/// Process-local handle to the shared data plane.
///
/// Constructed once per process from an [`ArenaConfig`] and passed
/// explicitly to everything that touches shared state. All handle
/// acquisition goes through [`ObjectRef`], which guarantees a matching
/// release on every exit path.
pub struct Arena {
    config: ArenaConfig,
    state: RwLock<ArenaState>,
    /// Name counter for geometry and container objects.
    next_object: AtomicU64,
    /// Name counter for scalar and vector arrays.
    next_array: AtomicU64,
}

// Compile-time assertion: Arena must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Arena>();
};

impl Arena {
    /// Create an arena from a validated configuration.
    pub fn new(config: ArenaConfig) -> Result<Arc<Self>, ArenaError> {
        config.validate()?;
        let pool = SegmentPool::new(config.segment_elems() as u32, config.max_segments);
        Ok(Arc::new(Self {
            config,
            state: RwLock::new(ArenaState {
                pool,
                slots: Vec::new(),
                free_slots: Vec::new(),
                directory: IndexMap::new(),
            }),
            next_object: AtomicU64::new(1),
            next_array: AtomicU64::new(1),
        }))
    }

    /// The configuration this arena was built from.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Reserve storage for `elements` elements of `kind`.
    ///
    /// The returned [`ObjectRef`] starts with reference count 1 and is
    /// invisible to other processes until [`Arena::publish`] registers a
    /// name for it. The payload is zeroed.
    pub fn allocate(
        self: &Arc<Self>,
        kind: ObjectKind,
        elements: u32,
        meta: ObjectMeta,
    ) -> Result<ObjectRef, ArenaError> {
        let slots_needed = elements as u64 * kind.components() as u64;
        if slots_needed > u32::MAX as u64 {
            return Err(ArenaError::OutOfMemory {
                requested: slots_needed as usize * std::mem::size_of::<f32>(),
                capacity: self.config.segment_bytes * self.config.max_segments as usize,
            });
        }

        let id = match kind {
            ObjectKind::ScalarArray | ObjectKind::VectorArray { .. } => {
                ObjectId(self.next_array.fetch_add(1, Ordering::Relaxed))
            }
            ObjectKind::Geometry | ObjectKind::Container => {
                ObjectId(self.next_object.fetch_add(1, Ordering::Relaxed))
            }
        };

        let mut state = self.state.write().expect("arena lock poisoned");
        let location = state.pool.alloc(slots_needed as u32)?;
        let storage = Arc::new(RwLock::new(vec![0.0; slots_needed as usize]));
        let slot = Slot {
            id,
            kind,
            elements,
            location,
            storage: Arc::clone(&storage),
            refs: AtomicU32::new(1),
            mapping: AtomicU8::new(MAPPING_UNSET),
            name: None,
            meta,
        };
        let index = match state.free_slots.pop() {
            Some(index) => {
                state.slots[index as usize] = SlotEntry::Occupied(slot);
                index
            }
            None => {
                state.slots.push(SlotEntry::Occupied(slot));
                (state.slots.len() - 1) as u32
            }
        };
        Ok(ObjectRef {
            arena: Arc::clone(self),
            slot: index,
            id,
            storage,
        })
    }

    /// Make `handle` visible under `name` to every attached process.
    ///
    /// Fails with [`ArenaError::NameCollision`] if `name` is registered
    /// and still referenced. After this returns, the object is treated as
    /// immutable by convention — a consumer that must modify it clones it
    /// first.
    pub fn publish(&self, handle: &ObjectRef, name: &str) -> Result<(), ArenaError> {
        let mut state = self.state.write().expect("arena lock poisoned");
        if state.directory.contains_key(name) {
            return Err(ArenaError::NameCollision {
                name: name.to_string(),
            });
        }
        let slot = state.slots[handle.slot as usize]
            .occupied_mut()
            .expect("publish on a released handle");
        assert_eq!(slot.id, handle.id, "publish on a recycled handle");
        slot.name = Some(name.to_string());
        state.directory.insert(name.to_string(), handle.slot);
        Ok(())
    }

    /// Look up a published object by name, acquiring a reference.
    pub fn lookup(self: &Arc<Self>, name: &str) -> Result<ObjectRef, ArenaError> {
        let state = self.state.read().expect("arena lock poisoned");
        let index = *state.directory.get(name).ok_or_else(|| ArenaError::NotFound {
            name: name.to_string(),
        })?;
        let slot = state.slots[index as usize]
            .occupied()
            .ok_or_else(|| ArenaError::NotFound {
                name: name.to_string(),
            })?;
        // Acquire only if the object is still alive; a count at zero means
        // a concurrent release is already destroying it.
        if !try_retain(&slot.refs) {
            return Err(ArenaError::NotFound {
                name: name.to_string(),
            });
        }
        Ok(ObjectRef {
            arena: Arc::clone(self),
            slot: index,
            id: slot.id,
            storage: Arc::clone(&slot.storage),
        })
    }

    /// Current id-counter watermarks `(next_object, next_array)`.
    ///
    /// Published to an external writer during the synchronized-id
    /// handshake; the writer continues strictly above both values.
    pub fn id_watermarks(&self) -> (u64, u64) {
        (
            self.next_object.load(Ordering::Relaxed),
            self.next_array.load(Ordering::Relaxed),
        )
    }

    /// Usage metrics.
    pub fn metrics(&self) -> ArenaMetrics {
        let state = self.state.read().expect("arena lock poisoned");
        ArenaMetrics {
            memory_bytes: state.pool.memory_bytes(),
            object_count: state
                .slots
                .iter()
                .filter(|s| s.occupied().is_some())
                .count(),
            segment_count: state.pool.segment_count(),
        }
    }

    /// Published names with their current reference counts, in
    /// registration order. For diagnostics.
    pub fn directory_snapshot(&self) -> Vec<(String, u32)> {
        let state = self.state.read().expect("arena lock poisoned");
        state
            .directory
            .iter()
            .filter_map(|(name, &index)| {
                state.slots[index as usize]
                    .occupied()
                    .map(|slot| (name.clone(), slot.refs.load(Ordering::Acquire)))
            })
            .collect()
    }

    fn add_ref(&self, handle: &ObjectRef) {
        let state = self.state.read().expect("arena lock poisoned");
        let slot = state.slots[handle.slot as usize]
            .occupied()
            .expect("add_ref on a released handle");
        assert_eq!(slot.id, handle.id, "add_ref on a recycled handle");
        slot.refs.fetch_add(1, Ordering::AcqRel);
    }

    fn release(&self, handle: &ObjectRef) {
        let last = {
            let state = self.state.read().expect("arena lock poisoned");
            let slot = state.slots[handle.slot as usize]
                .occupied()
                .expect("release on an unknown handle: broken ownership contract");
            assert_eq!(
                slot.id, handle.id,
                "release on a recycled handle: broken ownership contract"
            );
            slot.refs.fetch_sub(1, Ordering::AcqRel) == 1
        };
        if last {
            self.destroy(handle.slot, handle.id);
        }
    }

    /// Destroy a slot whose count reached zero: reclaim the capacity
    /// reservation, drop the directory entry, and recycle the slot
    /// index. The payload itself is freed when the last storage handle
    /// drops.
    fn destroy(&self, index: u32, id: ObjectId) {
        let mut state = self.state.write().expect("arena lock poisoned");
        let dead = match state.slots[index as usize].occupied() {
            // try_retain never resurrects a zero count, so once zero is
            // observed the slot is ours to reclaim.
            Some(slot) => slot.id == id && slot.refs.load(Ordering::Acquire) == 0,
            None => false,
        };
        if !dead {
            return;
        }
        let entry = std::mem::replace(&mut state.slots[index as usize], SlotEntry::Vacant);
        if let SlotEntry::Occupied(slot) = entry {
            state.pool.free(slot.location);
            if let Some(name) = &slot.name {
                state.directory.shift_remove(name);
            }
        }
        state.free_slots.push(index);
    }
}

/// Increment a reference count only if the object is still alive.
fn try_retain(refs: &AtomicU32) -> bool {
    let mut count = refs.load(Ordering::Acquire);
    while count > 0 {
        match refs.compare_exchange_weak(count, count + 1, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return true,
            Err(observed) => count = observed,
        }
    }
    false
}

/// RAII reference to a shared object.
///
/// Cloning acquires a reference; dropping releases one. The drop that
/// brings the count to zero destroys the object in place and removes its
/// directory entry, so a handle held on any exit path — including error
/// paths — always pairs acquisition with release.
pub struct ObjectRef {
    arena: Arc<Arena>,
    slot: u32,
    id: ObjectId,
    /// Payload storage, shared with the slot. Keeping it on the handle
    /// lets reads and writes bypass the arena state lock entirely.
    storage: Arc<RwLock<Vec<f32>>>,
}

impl ObjectRef {
    /// The object's unique id.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The arena this handle lives in.
    pub fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    /// The object's kind.
    pub fn kind(&self) -> ObjectKind {
        self.with_slot(|slot| slot.kind)
    }

    /// Logical length in elements.
    pub fn elements(&self) -> u32 {
        self.with_slot(|slot| slot.elements)
    }

    /// The published name, if any.
    pub fn name(&self) -> Option<String> {
        self.with_slot(|slot| slot.name.clone())
    }

    /// Current reference count. Diagnostics only — the value may be
    /// stale by the time the caller inspects it.
    pub fn ref_count(&self) -> u32 {
        self.with_slot(|slot| slot.refs.load(Ordering::Acquire))
    }

    /// Clone of the object's metadata.
    pub fn meta(&self) -> ObjectMeta {
        self.with_slot(|slot| slot.meta.clone())
    }

    /// Mutate the object's metadata.
    ///
    /// Legal only for the creator before publication, by convention.
    pub fn update_meta(&self, f: impl FnOnce(&mut ObjectMeta)) {
        let mut state = self.arena.state.write().expect("arena lock poisoned");
        let slot = state.slots[self.slot as usize]
            .occupied_mut()
            .expect("update_meta on a released handle");
        assert_eq!(slot.id, self.id, "update_meta on a recycled handle");
        f(&mut slot.meta);
    }

    /// Publish this object under `name`.
    pub fn publish(&self, name: &str) -> Result<(), ArenaError> {
        self.arena.publish(self, name)
    }

    /// Read access to the payload. Any number of concurrent readers;
    /// only a writer of this same object blocks them.
    pub fn read(&self) -> DataRead<'_> {
        DataRead {
            guard: self.storage.read().expect("payload lock poisoned"),
        }
    }

    /// Write access to the payload, exclusive for this object only.
    ///
    /// Legal only for the creator before publication, by convention; the
    /// arena does not enforce this beyond the per-object lock.
    pub fn write(&self) -> DataWrite<'_> {
        DataWrite {
            guard: self.storage.write().expect("payload lock poisoned"),
        }
    }

    /// The cached mapping kind, if one has been inferred.
    pub fn mapping_hint(&self) -> Option<MappingKind> {
        self.with_slot(|slot| match slot.mapping.load(Ordering::Acquire) {
            MAPPING_VERTEX => Some(MappingKind::Vertex),
            MAPPING_ELEMENT => Some(MappingKind::Element),
            MAPPING_UNKNOWN => Some(MappingKind::Unknown),
            _ => None,
        })
    }

    /// Cache an inferred mapping kind. Idempotent: later stores of a
    /// different value are ignored in favour of the first.
    pub fn store_mapping_hint(&self, mapping: MappingKind) {
        let encoded = match mapping {
            MappingKind::Vertex => MAPPING_VERTEX,
            MappingKind::Element => MAPPING_ELEMENT,
            MappingKind::Unknown => MAPPING_UNKNOWN,
        };
        self.with_slot(|slot| {
            let _ = slot.mapping.compare_exchange(
                MAPPING_UNSET,
                encoded,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        });
    }

    fn with_slot<T>(&self, f: impl FnOnce(&Slot) -> T) -> T {
        let state = self.arena.state.read().expect("arena lock poisoned");
        let slot = state.slots[self.slot as usize]
            .occupied()
            .expect("access through a released handle");
        assert_eq!(slot.id, self.id, "access through a recycled handle");
        f(slot)
    }
}

impl Clone for ObjectRef {
    fn clone(&self) -> Self {
        self.arena.add_ref(self);
        Self {
            arena: Arc::clone(&self.arena),
            slot: self.slot,
            id: self.id,
            storage: Arc::clone(&self.storage),
        }
    }
}

impl Drop for ObjectRef {
    fn drop(&mut self) {
        self.arena.release(self);
    }
}

impl std::fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectRef")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .finish()
    }
}

/// Shared read guard over an object's payload.
pub struct DataRead<'a> {
    guard: RwLockReadGuard<'a, Vec<f32>>,
}

impl std::ops::Deref for DataRead<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.guard
    }
}

/// Exclusive write guard over an object's payload.
pub struct DataWrite<'a> {
    guard: RwLockWriteGuard<'a, Vec<f32>>,
}

impl std::ops::Deref for DataWrite<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.guard
    }
}

impl std::ops::DerefMut for DataWrite<'_> {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.guard
    }
}
