//! Execution phases and the per-module state machine.
//!
//! Every module replica moves through the same cycle:
//!
//! ```text
//!           Execute msg                 prepare ok
//!   Idle ───────────────▶ Preparing ───────────────▶ Executing
//!     ▲                       │                          │
//!     │      prepare failed   │        compute done /    │
//!     │◀──────────────────────┘        cancel / peer     │
//!     │                                 disconnect       ▼
//!     └─────────────────────────────────────────── Reducing
//! ```
//!
//! The runner is the only writer; everything else observes the phase
//! through a shared [`PhaseCell`]. Illegal transitions are programming
//! errors in the runner and are surfaced as assertions.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use skein_core::ExecutionId;

/// The four phases of a module replica.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for an execute message.
    Idle,
    /// Running the prepare step; no compute work accepted yet.
    Preparing,
    /// Running compute steps; the only phase in which publishing
    /// results is legal.
    Executing,
    /// Running a reduction step.
    Reducing,
}

impl Phase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Preparing,
            2 => Self::Executing,
            3 => Self::Reducing,
            other => unreachable!("phase cell holds invalid value {other}"),
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Preparing => 1,
            Self::Executing => 2,
            Self::Reducing => 3,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::Executing => "executing",
            Self::Reducing => "reducing",
        };
        f.write_str(text)
    }
}

/// Shared, lock-free view of a replica's current phase.
///
/// Written by the runner thread, read by the controller and tests.
#[derive(Debug)]
pub struct PhaseCell(AtomicU8);

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseCell {
    /// A cell starting in [`Phase::Idle`].
    pub fn new() -> Self {
        Self(AtomicU8::new(Phase::Idle.as_u8()))
    }

    /// Current phase.
    pub fn get(&self) -> Phase {
        Phase::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, phase: Phase) {
        self.0.store(phase.as_u8(), Ordering::Release);
    }
}

/// The runner-owned state machine driving one replica.
pub struct ExecutionState {
    cell: Arc<PhaseCell>,
    execution: Option<ExecutionId>,
    executions_started: u64,
}

impl ExecutionState {
    /// Fresh state in [`Phase::Idle`], publishing into `cell`.
    pub fn new(cell: Arc<PhaseCell>) -> Self {
        Self {
            cell,
            execution: None,
            executions_started: 0,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.cell.get()
    }

    /// The execute request currently being served, if any.
    pub fn execution(&self) -> Option<ExecutionId> {
        self.execution
    }

    /// How many executions have been started. Monotonic.
    pub fn executions_started(&self) -> u64 {
        self.executions_started
    }

    /// Idle → Preparing, claiming `execution`.
    pub fn begin_prepare(&mut self, execution: ExecutionId) {
        assert_eq!(
            self.phase(),
            Phase::Idle,
            "execute accepted while not idle"
        );
        self.execution = Some(execution);
        self.executions_started += 1;
        self.cell.set(Phase::Preparing);
    }

    /// Preparing → Executing.
    pub fn begin_execute(&mut self) {
        assert_eq!(
            self.phase(),
            Phase::Preparing,
            "compute started before prepare completed"
        );
        self.cell.set(Phase::Executing);
    }

    /// Executing → Reducing.
    pub fn begin_reduce(&mut self) {
        assert_eq!(
            self.phase(),
            Phase::Executing,
            "reduction started outside a compute run"
        );
        self.cell.set(Phase::Reducing);
    }

    /// Reducing → Executing, for the next timestep boundary.
    pub fn resume_execute(&mut self) {
        assert_eq!(
            self.phase(),
            Phase::Reducing,
            "compute resumed outside a reduction"
        );
        self.cell.set(Phase::Executing);
    }

    /// Any phase → Idle, releasing the execution.
    pub fn to_idle(&mut self) {
        self.execution = None;
        self.cell.set(Phase::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ExecutionState {
        ExecutionState::new(Arc::new(PhaseCell::new()))
    }

    #[test]
    fn full_cycle_returns_to_idle() {
        let mut s = state();
        s.begin_prepare(ExecutionId(1));
        assert_eq!(s.phase(), Phase::Preparing);
        s.begin_execute();
        assert_eq!(s.phase(), Phase::Executing);
        s.begin_reduce();
        assert_eq!(s.phase(), Phase::Reducing);
        s.to_idle();
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.execution(), None);
    }

    #[test]
    fn per_timestep_boundaries_alternate_phases() {
        let mut s = state();
        s.begin_prepare(ExecutionId(2));
        s.begin_execute();
        for _ in 0..3 {
            s.begin_reduce();
            s.resume_execute();
        }
        assert_eq!(s.phase(), Phase::Executing);
    }

    #[test]
    fn prepare_failure_can_return_straight_to_idle() {
        let mut s = state();
        s.begin_prepare(ExecutionId(3));
        s.to_idle();
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn execution_counter_is_monotonic() {
        let mut s = state();
        for n in 1..=4 {
            s.begin_prepare(ExecutionId(n));
            s.to_idle();
        }
        assert_eq!(s.executions_started(), 4);
    }

    #[test]
    #[should_panic(expected = "execute accepted while not idle")]
    fn double_prepare_is_a_programming_error() {
        let mut s = state();
        s.begin_prepare(ExecutionId(1));
        s.begin_prepare(ExecutionId(2));
    }

    #[test]
    fn phase_cell_is_shared_with_observers() {
        let cell = Arc::new(PhaseCell::new());
        let mut s = ExecutionState::new(Arc::clone(&cell));
        s.begin_prepare(ExecutionId(1));
        assert_eq!(cell.get(), Phase::Preparing);
    }
}
