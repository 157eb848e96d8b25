//! The per-rank runner thread: control-message draining, the execution
//! state machine, reduction dispatch, and in-situ disconnect handling.
//!
//! The runner owns its `Box<dyn Module>` exclusively (moved in via
//! `thread::spawn`). There are no locks on the hot path: control
//! messages arrive over a bounded crossbeam channel, status flows back
//! over another, and the current phase is published through a shared
//! atomic cell.
//!
//! Scheduling is cooperative. Each pass drains the control channel and
//! the in-situ mailbox, then either does compute work or sleeps for an
//! adaptive interval that grows while idle and snaps back on the first
//! message. Cancellation is observed between compute steps, never mid
//! step, so compute steps must be bounded in duration.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use smallvec::smallvec;

use skein_arena::Arena;
use skein_core::{
    ControlMessage, ExecuteKind, ExecutionId, ModuleId, StatusMessage, Timestep, TimestepList,
};
use skein_queue::{Mailbox, QueueError};

use crate::config::{ConfigError, RunnerConfig};
use crate::module::{ComputeContext, ComputeTask, Module};
use crate::ports::PortSet;
use crate::reduce::{Collective, ReducePolicy};
use crate::state::{ExecutionState, Phase, PhaseCell};

/// A synchronization message from the coupled simulation writer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InSituEvent {
    /// The writer finished injecting a timestep's worth of objects.
    StepReady {
        /// The timestep that is now complete in the arena.
        timestep: Timestep,
    },
}

/// Controller-side handle to a spawned module replica.
pub struct ModuleHandle {
    control: Sender<ControlMessage>,
    status: Receiver<StatusMessage>,
    phase: Arc<PhaseCell>,
    join: JoinHandle<Box<dyn Module>>,
}

impl ModuleHandle {
    /// Request a full execution over `timesteps`. Returns `false` if
    /// the replica is gone.
    pub fn execute(&self, execution: ExecutionId, timesteps: TimestepList) -> bool {
        self.control
            .send(ControlMessage::Execute {
                what: ExecuteKind::ComputeExecute,
                execution,
                timesteps,
            })
            .is_ok()
    }

    /// Request a prepare-only pass.
    pub fn prepare_only(&self, execution: ExecutionId) -> bool {
        self.control
            .send(ControlMessage::Execute {
                what: ExecuteKind::Prepare,
                execution,
                timesteps: TimestepList::new(),
            })
            .is_ok()
    }

    /// Cancel the current execution.
    pub fn cancel(&self) -> bool {
        self.control.send(ControlMessage::CancelExecute).is_ok()
    }

    /// The replica's current phase.
    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    /// The replica's status stream.
    pub fn status(&self) -> &Receiver<StatusMessage> {
        &self.status
    }

    /// Shut the replica down and recover the module.
    pub fn join(self) -> Box<dyn Module> {
        let _ = self.control.send(ControlMessage::Shutdown);
        self.join.join().expect("module thread panicked")
    }
}

/// Spawn one module replica on its own runner thread.
///
/// The ports must be fully wired before spawning; `sim` couples the
/// replica to an external simulation writer when present.
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    module: Box<dyn Module>,
    arena: Arc<Arena>,
    module_id: ModuleId,
    ports: PortSet,
    collective: Arc<dyn Collective>,
    sim: Option<Mailbox<InSituEvent>>,
    config: RunnerConfig,
) -> Result<ModuleHandle, ConfigError> {
    config.validate()?;
    let (control_tx, control_rx) = bounded(config.control_capacity);
    let (status_tx, status_rx) = bounded(config.status_capacity);
    let phase = Arc::new(PhaseCell::new());

    let ctx = ComputeContext::new(
        arena,
        module_id,
        ports,
        Arc::clone(&collective),
        status_tx,
    );
    let runner = ModuleRunner {
        module,
        ctx,
        state: ExecutionState::new(Arc::clone(&phase)),
        control: control_rx,
        collective,
        sim,
        idle_wait: config.poll_min,
        config,
        shutdown: false,
    };
    let join = std::thread::spawn(move || runner.run());
    Ok(ModuleHandle {
        control: control_tx,
        status: status_rx,
        phase,
        join,
    })
}

struct ModuleRunner {
    module: Box<dyn Module>,
    ctx: ComputeContext,
    state: ExecutionState,
    control: Receiver<ControlMessage>,
    collective: Arc<dyn Collective>,
    sim: Option<Mailbox<InSituEvent>>,
    idle_wait: Duration,
    config: RunnerConfig,
    shutdown: bool,
}

impl ModuleRunner {
    /// Main event loop. Runs until shutdown, then returns the module so
    /// the controller can recover it through the join handle.
    fn run(mut self) -> Box<dyn Module> {
        loop {
            if self.shutdown {
                break;
            }
            match self.control.recv_timeout(self.idle_wait) {
                Ok(message) => {
                    self.idle_wait = self.config.poll_min;
                    self.handle(message);
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.poll_in_situ();
                    // Idle: back off toward the configured ceiling.
                    self.idle_wait = (self.idle_wait * 2).min(self.config.poll_max);
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.module
    }

    fn handle(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::Execute {
                what,
                execution,
                timesteps,
            } => self.handle_execute(what, execution, timesteps),
            ControlMessage::CancelExecute => {
                // Nothing active; a late cancel is not an error.
            }
            ControlMessage::Shutdown => self.shutdown = true,
        }
    }

    fn handle_execute(&mut self, what: ExecuteKind, execution: ExecutionId, timesteps: TimestepList) {
        // Artifacts cached under the previous execution are stale now.
        self.ctx.cache().invalidate_all();
        self.ctx.begin_execution(execution);
        self.state.begin_prepare(execution);
        self.ctx.set_phase(Phase::Preparing);

        let policy = self.module.reduce_policy();
        let prepare_failed = match self.module.prepare(&mut self.ctx) {
            Ok(()) => false,
            Err(err) => {
                self.ctx.post_error(format!("prepare failed: {err}"));
                true
            }
        };
        // A rank that cannot prepare takes the whole group with it;
        // otherwise the others would wait at collectives it never joins.
        let abandoned = if what == ExecuteKind::ComputeExecute && policy.is_collective() {
            self.collective.allreduce_sum_u64(u64::from(prepare_failed)) > 0
        } else {
            prepare_failed
        };
        if abandoned {
            if !prepare_failed {
                // This rank prepared fine; give it its teardown hook.
                if let Err(err) = self.module.finalize(&mut self.ctx) {
                    self.ctx.post_error(format!("finalize failed: {err}"));
                }
            }
            self.finish(execution);
            return;
        }
        if what == ExecuteKind::Prepare {
            self.finish(execution);
            return;
        }

        self.state.begin_execute();
        self.ctx.set_phase(Phase::Executing);

        let steps: TimestepList = if timesteps.is_empty() {
            smallvec![Timestep::NONE]
        } else {
            timesteps
        };
        let mut cancelled = false;

        for &timestep in &steps {
            let task = ComputeTask {
                execution,
                timestep,
                iteration: -1,
            };
            let mut abort = false;
            if let Err(err) = self.module.compute(&mut self.ctx, &task) {
                self.ctx
                    .post_error(format!("compute failed at timestep {timestep}: {err}"));
                abort = true;
            }
            if self.observe_cancellation() {
                abort = true;
            }
            if policy == ReducePolicy::PerTimestep {
                // Every rank reaches this boundary's collective work even
                // if its own compute failed; skipping it would strand the
                // peers at the barrier.
                self.reduce_boundary(timestep, true);
                // Whether to continue is a group decision, so all ranks
                // stop after the same boundary.
                abort = self.collective.allreduce_sum_u64(u64::from(abort)) > 0;
            }
            if abort {
                cancelled = true;
                break;
            }
        }

        // The final reduction runs even on a cancelled execution: ranks
        // that never observed the abort locally still arrive at the same
        // collective.
        match policy {
            ReducePolicy::OverAll => self.reduce_boundary(Timestep::NONE, true),
            ReducePolicy::Local => self.reduce_boundary(Timestep::NONE, false),
            ReducePolicy::PerTimestep | ReducePolicy::Never => {}
        }

        if cancelled {
            if let Err(err) = self.module.finalize(&mut self.ctx) {
                self.ctx.post_error(format!("finalize failed: {err}"));
            }
        }
        self.finish(execution);
    }

    /// Run one reduction boundary and return to the executing phase.
    fn reduce_boundary(&mut self, timestep: Timestep, collective: bool) {
        self.state.begin_reduce();
        self.ctx.set_phase(Phase::Reducing);
        if collective {
            // Every rank must have finished this boundary's compute.
            self.collective.barrier();
        }
        if let Err(err) = self.module.reduce(&mut self.ctx, timestep) {
            self.ctx
                .post_error(format!("reduce failed at timestep {timestep}: {err}"));
        }
        self.state.resume_execute();
        self.ctx.set_phase(Phase::Executing);
    }

    /// Return to idle and post the execution's terminal status note.
    ///
    /// Every execution path ends here, so observers can treat the note
    /// as the completion signal regardless of how the execution went.
    fn finish(&mut self, execution: ExecutionId) {
        self.state.to_idle();
        self.ctx.set_phase(Phase::Idle);
        self.ctx.end_execution();
        self.ctx
            .post_info(format!("execution {execution} finished"));
    }

    /// Check for cancellation between compute steps: a cancel or
    /// shutdown message, a vanished coordinator, or a vanished in-situ
    /// writer all abort the current execution.
    fn observe_cancellation(&mut self) -> bool {
        let mut cancelled = false;
        loop {
            match self.control.try_recv() {
                Ok(ControlMessage::CancelExecute) => cancelled = true,
                Ok(ControlMessage::Shutdown) => {
                    self.shutdown = true;
                    cancelled = true;
                }
                Ok(ControlMessage::Execute { .. }) => {
                    self.ctx
                        .post_warning("execute request ignored while busy");
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.shutdown = true;
                    cancelled = true;
                    break;
                }
            }
        }
        if self.poll_in_situ() {
            cancelled = true;
        }
        cancelled
    }

    /// Drain the in-situ mailbox. Returns `true` when the writer is
    /// gone, which aborts any execution in flight.
    fn poll_in_situ(&mut self) -> bool {
        let Some(sim) = &self.sim else {
            return false;
        };
        loop {
            match sim.try_recv() {
                Ok(InSituEvent::StepReady { timestep }) => {
                    self.ctx
                        .post_info(format!("simulation step {timestep} ready"));
                }
                Err(QueueError::Empty { .. }) => return false,
                Err(QueueError::Disconnected { .. }) => {
                    self.ctx.post_warning("external writer disconnected");
                    self.sim = None;
                    return true;
                }
                Err(_) => return false,
            }
        }
    }
}
