//! Reduce policies and the collective seam.
//!
//! A module's reduce policy is fixed at registration and decides where
//! its reduction step runs: nowhere, once per rank, once across all
//! ranks, or once per timestep boundary across all ranks. The
//! rank-spanning cases go through the [`Collective`] trait so the
//! runner and tests can drive real multi-participant reductions with
//! plain threads; a launcher backed by an actual message-passing
//! runtime implements the same trait.
//!
//! A collective call returns only once every participant has arrived.
//! A rank that skips a reduction its peers entered hangs the group;
//! the runner funnels every execution path into the same reduction
//! calls precisely so user modules never get the chance.

use std::sync::{Arc, Barrier, Mutex};

use skein_core::Rank;

/// When and where a module's reduction step runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReducePolicy {
    /// No reduction step at all.
    Never,
    /// One reduction per rank, no cross-rank coordination.
    Local,
    /// Exactly one collective reduction per top-level execution.
    OverAll,
    /// One collective reduction at every timestep boundary.
    PerTimestep,
}

impl ReducePolicy {
    /// Whether this policy crosses rank boundaries.
    pub fn is_collective(&self) -> bool {
        matches!(self, Self::OverAll | Self::PerTimestep)
    }
}

/// Rank-spanning synchronization and reduction primitives.
///
/// Object-safe so the runner can hold it as `Arc<dyn Collective>`.
pub trait Collective: Send + Sync {
    /// This participant's rank.
    fn rank(&self) -> Rank;

    /// Number of participants.
    fn size(&self) -> u32;

    /// Block until every participant has arrived.
    fn barrier(&self);

    /// Sum `value` across all participants; every rank observes the
    /// identical total.
    fn allreduce_sum_f64(&self, value: f64) -> f64;

    /// Sum `value` across all participants; every rank observes the
    /// identical total.
    fn allreduce_sum_u64(&self, value: u64) -> u64;
}

// ── LocalCollective ───────────────────────────────────────────────

struct GroupShared {
    barrier: Barrier,
    acc_f64: Mutex<f64>,
    acc_u64: Mutex<u64>,
}

/// A thread-backed collective group within one process.
///
/// Each participant runs on its own thread and holds one member handle.
/// Reductions accumulate under a mutex and synchronize on a reusable
/// barrier; the barrier leader resets the accumulator between rounds.
pub struct LocalCollective {
    rank: Rank,
    size: u32,
    shared: Arc<GroupShared>,
}

impl LocalCollective {
    /// Create a group of `size` member handles, one per participant
    /// thread, with ranks `0..size`.
    pub fn group(size: u32) -> Vec<LocalCollective> {
        assert!(size > 0, "a collective group needs at least one rank");
        let shared = Arc::new(GroupShared {
            barrier: Barrier::new(size as usize),
            acc_f64: Mutex::new(0.0),
            acc_u64: Mutex::new(0),
        });
        (0..size)
            .map(|rank| LocalCollective {
                rank: Rank(rank),
                size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl Collective for LocalCollective {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }

    fn allreduce_sum_f64(&self, value: f64) -> f64 {
        {
            let mut acc = self.shared.acc_f64.lock().expect("collective lock poisoned");
            *acc += value;
        }
        // All contributions are in.
        self.shared.barrier.wait();
        let total = *self.shared.acc_f64.lock().expect("collective lock poisoned");
        // All reads are done; the leader resets before anyone can start
        // the next round.
        let wave = self.shared.barrier.wait();
        if wave.is_leader() {
            *self.shared.acc_f64.lock().expect("collective lock poisoned") = 0.0;
        }
        self.shared.barrier.wait();
        total
    }

    fn allreduce_sum_u64(&self, value: u64) -> u64 {
        {
            let mut acc = self.shared.acc_u64.lock().expect("collective lock poisoned");
            *acc += value;
        }
        self.shared.barrier.wait();
        let total = *self.shared.acc_u64.lock().expect("collective lock poisoned");
        let wave = self.shared.barrier.wait();
        if wave.is_leader() {
            *self.shared.acc_u64.lock().expect("collective lock poisoned") = 0;
        }
        self.shared.barrier.wait();
        total
    }
}
