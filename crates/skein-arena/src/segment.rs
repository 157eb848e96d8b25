//! Fixed-size capacity segments and the recycling segment pool.
//!
//! A [`Segment`] is a fixed-size allocation ledger with a bump cursor;
//! a [`SegmentPool`] grows by whole segments up to a cap and keeps a
//! free list so released regions can be recycled — object lifetimes are
//! reference-counted, not generational, so regions come and go
//! individually. The pool accounts for capacity only; the payload bytes
//! themselves live with each object behind its own lock, so the pool is
//! never on a read or write path.

use crate::error::ArenaError;

/// Allocation ledger for one fixed-size region.
///
/// Segments are never resized. Freed regions return to the pool's free
/// list, except at the tail, where they retreat the bump cursor.
pub struct Segment {
    capacity: u32,
    /// Bump pointer: next never-used position (in f32 slots).
    cursor: u32,
}

impl Segment {
    /// Create a new segment with the given capacity (in f32 slots).
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            cursor: 0,
        }
    }

    /// Bump-allocate `len` f32 slots from the never-used tail.
    ///
    /// Returns the starting offset, or `None` if the tail is too small.
    /// Recycled space is handled by the pool's free list, not here.
    pub fn bump(&mut self, len: u32) -> Option<u32> {
        let new_cursor = self.cursor.checked_add(len)?;
        if new_cursor > self.capacity {
            return None;
        }
        let offset = self.cursor;
        self.cursor = new_cursor;
        Some(offset)
    }

    /// First never-used position.
    pub fn tail(&self) -> u32 {
        self.cursor
    }

    /// Hand a region ending exactly at the tail back to the bump
    /// allocator.
    pub fn retreat(&mut self, offset: u32, len: u32) {
        debug_assert_eq!(offset + len, self.cursor, "retreat must abut the tail");
        self.cursor = offset;
    }

    /// Total capacity in f32 slots.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Reserved capacity of this segment in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.capacity as usize * std::mem::size_of::<f32>()
    }
}

/// Location of a payload within the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PayloadLocation {
    /// Index of the segment holding the payload.
    pub segment: u16,
    /// Offset within the segment, in f32 slots.
    pub offset: u32,
    /// Length in f32 slots.
    pub len: u32,
}

/// A region on the free list, available for recycling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FreeBlock {
    segment: u16,
    offset: u32,
    len: u32,
}

/// A growable pool of [`Segment`]s with a recycling free list.
///
/// Allocation order: first-fit from the free list, then bump from the
/// current segment, then a new segment (up to `max_segments`). An
/// allocation never spans segments.
pub struct SegmentPool {
    segments: Vec<Segment>,
    segment_size: u32,
    max_segments: u16,
    free: Vec<FreeBlock>,
}

impl SegmentPool {
    /// Create a pool with one pre-allocated segment.
    pub fn new(segment_size: u32, max_segments: u16) -> Self {
        let mut segments = Vec::with_capacity(max_segments as usize);
        segments.push(Segment::new(segment_size));
        Self {
            segments,
            segment_size,
            max_segments,
            free: Vec::new(),
        }
    }

    /// Reserve `len` f32 slots.
    ///
    /// Zero-length allocations succeed with a zero-length location in
    /// segment 0 (containers carry no payload of their own).
    pub fn alloc(&mut self, len: u32) -> Result<PayloadLocation, ArenaError> {
        if len == 0 {
            return Ok(PayloadLocation {
                segment: 0,
                offset: 0,
                len: 0,
            });
        }
        // Reject allocations that can never fit in a single segment.
        if len > self.segment_size {
            return Err(self.out_of_memory(len));
        }

        // First fit from the free list, splitting the remainder back.
        if let Some(idx) = self.free.iter().position(|b| b.len >= len) {
            let block = self.free[idx];
            if block.len == len {
                self.free.swap_remove(idx);
            } else {
                self.free[idx] = FreeBlock {
                    segment: block.segment,
                    offset: block.offset + len,
                    len: block.len - len,
                };
            }
            return Ok(PayloadLocation {
                segment: block.segment,
                offset: block.offset,
                len,
            });
        }

        // Bump from any segment with remaining never-used tail.
        for (i, seg) in self.segments.iter_mut().enumerate() {
            if let Some(offset) = seg.bump(len) {
                return Ok(PayloadLocation {
                    segment: i as u16,
                    offset,
                    len,
                });
            }
        }

        // Grow by a whole segment.
        if self.segments.len() >= self.max_segments as usize {
            return Err(self.out_of_memory(len));
        }
        let mut seg = Segment::new(self.segment_size);
        let offset = seg
            .bump(len)
            .expect("len <= segment_size, so a fresh segment always fits");
        self.segments.push(seg);
        Ok(PayloadLocation {
            segment: (self.segments.len() - 1) as u16,
            offset,
            len,
        })
    }

    /// Return a payload's region, coalescing with adjacent free blocks
    /// in the same segment.
    ///
    /// A region that ends up abutting the segment's never-used tail is
    /// merged back into the bump cursor instead of staying on the free
    /// list, so alternating alloc/free cycles never strand capacity.
    pub fn free(&mut self, loc: PayloadLocation) {
        if loc.len == 0 {
            return;
        }
        let mut merged = FreeBlock {
            segment: loc.segment,
            offset: loc.offset,
            len: loc.len,
        };
        // Absorb any blocks touching the released region.
        loop {
            let adjacent = self.free.iter().position(|b| {
                b.segment == merged.segment
                    && (b.offset + b.len == merged.offset || merged.offset + merged.len == b.offset)
            });
            match adjacent {
                Some(idx) => {
                    let other = self.free.swap_remove(idx);
                    merged = FreeBlock {
                        segment: merged.segment,
                        offset: merged.offset.min(other.offset),
                        len: merged.len + other.len,
                    };
                }
                None => break,
            }
        }
        // Full coalescing already absorbed every block adjacent to the
        // merged region, so after a cursor retreat nothing else on the
        // free list can abut the new tail.
        let seg = &mut self.segments[merged.segment as usize];
        if merged.offset + merged.len == seg.tail() {
            seg.retreat(merged.offset, merged.len);
        } else {
            self.free.push(merged);
        }
    }

    /// Number of segments currently allocated.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Total reserved capacity across all segments in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.segments.iter().map(|s| s.memory_bytes()).sum()
    }

    fn out_of_memory(&self, len: u32) -> ArenaError {
        ArenaError::OutOfMemory {
            requested: len as usize * std::mem::size_of::<f32>(),
            capacity: self.max_segments as usize
                * self.segment_size as usize
                * std::mem::size_of::<f32>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sequential_allocs_bump() {
        let mut pool = SegmentPool::new(1024, 4);
        let a = pool.alloc(100).unwrap();
        let b = pool.alloc(200).unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(b.offset, 100);
        assert_eq!(a.segment, b.segment);
    }

    #[test]
    fn grows_on_overflow() {
        let mut pool = SegmentPool::new(100, 4);
        pool.alloc(100).unwrap();
        let b = pool.alloc(50).unwrap();
        assert_eq!(b.segment, 1);
        assert_eq!(pool.segment_count(), 2);
    }

    #[test]
    fn pool_exhaustion_is_out_of_memory() {
        let mut pool = SegmentPool::new(100, 2);
        pool.alloc(100).unwrap();
        pool.alloc(100).unwrap();
        assert!(matches!(
            pool.alloc(1),
            Err(ArenaError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn oversized_alloc_is_out_of_memory_not_panic() {
        let mut pool = SegmentPool::new(100, 4);
        assert!(matches!(
            pool.alloc(101),
            Err(ArenaError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn freed_region_is_recycled() {
        let mut pool = SegmentPool::new(100, 1);
        let a = pool.alloc(60).unwrap();
        pool.alloc(40).unwrap(); // pool now full
        pool.free(a);
        let c = pool.alloc(60).unwrap();
        assert_eq!(c, a, "recycled allocation should reuse the freed region");
    }

    #[test]
    fn free_list_splits_larger_blocks() {
        let mut pool = SegmentPool::new(100, 1);
        let a = pool.alloc(50).unwrap();
        let b = pool.alloc(30).unwrap();
        pool.alloc(20).unwrap(); // pin the tail so the blocks stay listed
        pool.free(a);
        pool.free(b);
        let c = pool.alloc(30).unwrap();
        let d = pool.alloc(50).unwrap();
        assert_eq!(c.offset, 0);
        assert_eq!(d.offset, 30);
    }

    #[test]
    fn adjacent_free_blocks_coalesce() {
        let mut pool = SegmentPool::new(100, 1);
        let a = pool.alloc(50).unwrap();
        let b = pool.alloc(50).unwrap();
        pool.free(a);
        pool.free(b);
        // Only possible if the two 50-slot blocks merged.
        assert!(pool.alloc(100).is_ok());
    }

    #[test]
    fn free_at_the_tail_retreats_the_bump_cursor() {
        let mut pool = SegmentPool::new(128, 1);
        let a = pool.alloc(1).unwrap();
        pool.free(a);
        // The single slot went back to the bump allocator, so the whole
        // segment is available again in one piece.
        assert!(pool.alloc(128).is_ok());
    }

    #[test]
    fn coalesced_interior_blocks_reach_the_tail() {
        let mut pool = SegmentPool::new(128, 1);
        let a = pool.alloc(50).unwrap();
        let b = pool.alloc(50).unwrap();
        let c = pool.alloc(28).unwrap();
        pool.free(b);
        pool.free(c); // merges with b, then retreats the cursor to 50
        pool.free(a); // abuts the retreated cursor
        assert!(pool.alloc(128).is_ok());
    }

    #[test]
    fn zero_length_alloc_succeeds() {
        let mut pool = SegmentPool::new(100, 1);
        let loc = pool.alloc(0).unwrap();
        assert_eq!(loc.len, 0);
        pool.free(loc); // no-op, must not corrupt the free list
        assert!(pool.alloc(100).is_ok());
    }

    proptest! {
        // Alloc/free interleavings never leak capacity: after releasing
        // everything, a full-segment allocation must succeed again.
        #[test]
        fn full_release_restores_full_capacity(sizes in prop::collection::vec(1u32..20, 1..12)) {
            let mut pool = SegmentPool::new(128, 1);
            let mut live = Vec::new();
            for len in sizes {
                match pool.alloc(len) {
                    Ok(loc) => live.push(loc),
                    Err(_) => break,
                }
            }
            for loc in live.drain(..) {
                pool.free(loc);
            }
            prop_assert!(pool.alloc(128).is_ok());
        }

        // Live allocations never overlap.
        #[test]
        fn live_allocations_disjoint(sizes in prop::collection::vec(1u32..30, 2..10)) {
            let mut pool = SegmentPool::new(256, 2);
            let mut live: Vec<PayloadLocation> = Vec::new();
            for len in sizes {
                if let Ok(loc) = pool.alloc(len) {
                    live.push(loc);
                }
            }
            for (i, a) in live.iter().enumerate() {
                for b in live.iter().skip(i + 1) {
                    if a.segment == b.segment {
                        let disjoint = a.offset + a.len <= b.offset || b.offset + b.len <= a.offset;
                        prop_assert!(disjoint, "{a:?} overlaps {b:?}");
                    }
                }
            }
        }
    }
}
