//! Strongly-typed identifiers used across the data plane.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Identifies a shared object within a process group.
///
/// Object IDs are drawn from a monotonically increasing per-arena counter.
/// The synchronized-id handshake guarantees that an external writer's IDs
/// never overlap with the module's own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ObjectId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Identifies a module instance within the pipeline.
///
/// Assigned by the coordinator at registration and stable for the
/// lifetime of the module process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ModuleId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// MPI-style rank of a module replica within its process group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rank(pub u32);

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Rank {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// A simulation timestep.
///
/// `Timestep::NONE` (−1) marks an object or operation that is not
/// timestep-specific.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestep(pub i64);

impl Timestep {
    /// Sentinel for "not timestep-specific".
    pub const NONE: Timestep = Timestep(-1);

    /// Whether this is the "not timestep-specific" sentinel.
    pub fn is_none(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Timestep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Timestep {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// A spatial-decomposition partition index.
///
/// `BlockIndex::WHOLE` (−1) marks data covering the whole domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockIndex(pub i64);

impl BlockIndex {
    /// Sentinel for "whole domain".
    pub const WHOLE: BlockIndex = BlockIndex(-1);

    /// Whether this block covers the whole domain.
    pub fn is_whole(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for BlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for BlockIndex {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// Monotonically increasing top-level execution counter.
///
/// Incremented each time the coordinator requests a new execution of a
/// module; never reused within a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionId(pub u64);

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ExecutionId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Counter for unique [`InstanceNumber`] allocation.
static INSTANCE_COUNTER: AtomicU32 = AtomicU32::new(1);

/// Distinguishes successive attachments of an external writer.
///
/// A simulation may attach to the same module several times over a run.
/// Each (re)connect is assigned a fresh instance number from a monotonic
/// atomic counter via [`InstanceNumber::next`]; numbers are never reused
/// within a run, so a stale message from a previous attachment can always
/// be told apart from the current one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceNumber(u32);

impl InstanceNumber {
    /// Allocate a fresh, unique instance number. Thread-safe.
    pub fn next() -> Self {
        Self(INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for InstanceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestep_sentinel() {
        assert!(Timestep::NONE.is_none());
        assert!(!Timestep(0).is_none());
        assert!(Timestep(-5).is_none());
    }

    #[test]
    fn block_sentinel() {
        assert!(BlockIndex::WHOLE.is_whole());
        assert!(!BlockIndex(3).is_whole());
    }

    #[test]
    fn instance_numbers_are_monotonic_and_unique() {
        let a = InstanceNumber::next();
        let b = InstanceNumber::next();
        let c = InstanceNumber::next();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn instance_numbers_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..100).map(|_| InstanceNumber::next()).collect::<Vec<_>>()))
            .collect();
        let mut all: Vec<InstanceNumber> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let before = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), before);
    }
}
