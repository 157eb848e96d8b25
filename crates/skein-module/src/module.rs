//! The `Module` trait and the context its hooks run against.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;

use skein_arena::{Arena, ObjectRef};
use skein_cache::ResultCache;
use skein_core::{ExecutionId, ModuleError, ModuleId, Rank, StatusMessage, Timestep};

use crate::ports::PortSet;
use crate::reduce::{Collective, ReducePolicy};
use crate::state::Phase;

/// How long a compute step waits for an upstream object before giving
/// up on the port for this step.
const INPUT_WAIT: Duration = Duration::from_millis(100);

/// One unit of compute work handed to [`Module::compute`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComputeTask {
    /// The execution this task belongs to.
    pub execution: ExecutionId,
    /// The timestep to process; [`Timestep::NONE`] for a non-timestep
    /// pass.
    pub timestep: Timestep,
    /// Iteration number inside an iterative sub-loop; `-1` outside one.
    pub iteration: i64,
}

/// A pipeline processing stage.
///
/// Implementations are driven by one runner thread per rank; hooks take
/// `&mut self` and never run concurrently with each other. Object-safe
/// so the runner can hold replicas as `Box<dyn Module>`.
pub trait Module: Send {
    /// Human-readable module name for logs and status messages.
    fn name(&self) -> &str;

    /// Where this module's reduction runs. Fixed at registration.
    fn reduce_policy(&self) -> ReducePolicy {
        ReducePolicy::Never
    }

    /// Called once per execution before any compute work.
    fn prepare(&mut self, _ctx: &mut ComputeContext) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Process one task. The only hook in which publishing results is
    /// legal.
    fn compute(&mut self, ctx: &mut ComputeContext, task: &ComputeTask) -> Result<(), ModuleError>;

    /// The reduction step. `timestep` is the boundary just completed
    /// for per-timestep policies and [`Timestep::NONE`] otherwise.
    fn reduce(&mut self, _ctx: &mut ComputeContext, _timestep: Timestep) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Cancellation hook: release module-held resources of the aborted
    /// execution. A failure here is reported but never blocks the
    /// return to idle.
    fn finalize(&mut self, _ctx: &mut ComputeContext) -> Result<(), ModuleError> {
        Ok(())
    }
}

/// Everything a module hook may touch: the arena, the ports, the result
/// cache, and the status stream.
///
/// Owned by the runner thread and lent to each hook in turn.
pub struct ComputeContext {
    arena: Arc<Arena>,
    module: ModuleId,
    rank: Rank,
    ports: PortSet,
    collective: Arc<dyn Collective>,
    cache: Arc<ResultCache<Vec<String>>>,
    status: Sender<StatusMessage>,
    phase: Phase,
    execution: Option<ExecutionId>,
    /// Strong references to this execution's published outputs, held so
    /// downstream consumers can still look them up after compute moves
    /// on. Dropped when the next execution begins.
    retained: Vec<ObjectRef>,
}

impl ComputeContext {
    /// Build a context for one replica. The rank comes from the
    /// collective's membership.
    pub fn new(
        arena: Arc<Arena>,
        module: ModuleId,
        ports: PortSet,
        collective: Arc<dyn Collective>,
        status: Sender<StatusMessage>,
    ) -> Self {
        Self {
            arena,
            module,
            rank: collective.rank(),
            ports,
            collective,
            cache: Arc::new(ResultCache::new()),
            status,
            phase: Phase::Idle,
            execution: None,
            retained: Vec::new(),
        }
    }

    /// The shared arena.
    pub fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    /// This replica's module id.
    pub fn module_id(&self) -> ModuleId {
        self.module
    }

    /// This replica's rank.
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// The phase the replica is currently in.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The execution currently being served, if any.
    pub fn execution(&self) -> Option<ExecutionId> {
        self.execution
    }

    /// The rank-spanning collective this replica belongs to, for data
    /// reductions inside the reduce hook.
    pub fn collective(&self) -> &Arc<dyn Collective> {
        &self.collective
    }

    /// The per-module result cache, keyed by artifact name and holding
    /// the published object names of each cached bundle.
    pub fn cache(&self) -> &Arc<ResultCache<Vec<String>>> {
        &self.cache
    }

    /// The port set, for wiring before the runner starts.
    pub fn ports_mut(&mut self) -> &mut PortSet {
        &mut self.ports
    }

    /// Whether the named port has at least one connection.
    pub fn is_connected(&self, port: &str) -> bool {
        self.ports.is_connected(port)
    }

    /// Send a published object to every consumer of `port`.
    ///
    /// The object must already carry a published name, and publishing
    /// is legal only while executing. A strong reference is retained
    /// until the next execution so consumers can look the object up at
    /// their own pace.
    pub fn publish_output(&mut self, port: &str, object: &ObjectRef) -> Result<(), ModuleError> {
        assert_eq!(
            self.phase,
            Phase::Executing,
            "result published outside the executing phase"
        );
        let name = object
            .name()
            .ok_or_else(|| ModuleError::failed("cannot send an unpublished object"))?;
        self.ports
            .broadcast(port, &name)
            .ok_or_else(|| ModuleError::failed(format!("no output port '{port}'")))?;
        self.retained.push(object.clone());
        Ok(())
    }

    /// Take the next object from `port` and resolve it in the arena.
    pub fn read_input(&mut self, port: &str) -> Result<ObjectRef, ModuleError> {
        if !self.ports.is_connected(port) {
            return Err(ModuleError::MissingInput {
                port: port.to_string(),
            });
        }
        let name = self
            .ports
            .take_input(port, INPUT_WAIT)
            .map_err(|_| ModuleError::MissingInput {
                port: port.to_string(),
            })?
            .ok_or_else(|| ModuleError::MissingInput {
                port: port.to_string(),
            })?;
        self.arena
            .lookup(&name)
            .map_err(|_| ModuleError::ObjectUnavailable { name })
    }

    /// Emit an informational status message. Best-effort: status is
    /// observational only, so a full or closed channel drops it rather
    /// than stalling compute.
    pub fn post_info(&self, text: impl Into<String>) {
        let _ = self
            .status
            .try_send(StatusMessage::info(self.module, self.rank, text));
    }

    /// Emit a warning. Best-effort.
    pub fn post_warning(&self, text: impl Into<String>) {
        let _ = self
            .status
            .try_send(StatusMessage::warning(self.module, self.rank, text));
    }

    /// Emit an error message. Best-effort.
    pub fn post_error(&self, text: impl Into<String>) {
        let _ = self
            .status
            .try_send(StatusMessage::error(self.module, self.rank, text));
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn begin_execution(&mut self, execution: ExecutionId) {
        self.execution = Some(execution);
        // Previous execution's outputs are no longer pinned by us.
        self.retained.clear();
    }

    pub(crate) fn end_execution(&mut self) {
        self.execution = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use skein_arena::ArenaConfig;
    use skein_core::{ObjectKind, ObjectMeta};

    fn test_arena() -> Arc<Arena> {
        Arena::new(ArenaConfig {
            segment_name: "context-test".into(),
            segment_bytes: 32 * 1024,
            max_segments: 2,
        })
        .unwrap()
    }

    fn context(arena: &Arc<Arena>, ports: PortSet) -> ComputeContext {
        let (status_tx, _status_rx) = unbounded();
        let collective = Arc::new(crate::reduce::LocalCollective::group(1).remove(0));
        ComputeContext::new(Arc::clone(arena), ModuleId(1), ports, collective, status_tx)
    }

    #[test]
    fn published_output_reaches_a_wired_consumer() {
        let arena = test_arena();
        let mut producer_ports = PortSet::new();
        let mut consumer_ports = PortSet::new();
        producer_ports.create_output_port("out").unwrap();
        consumer_ports.create_input_port("in").unwrap();
        PortSet::connect(&mut producer_ports, "out", &mut consumer_ports, "in").unwrap();

        let mut producer = context(&arena, producer_ports);
        let mut consumer = context(&arena, consumer_ports);
        producer.set_phase(Phase::Executing);

        let object = arena
            .allocate(ObjectKind::ScalarArray, 4, ObjectMeta::new(Rank(0), ModuleId(1)))
            .unwrap();
        object.publish("result0").unwrap();
        producer.publish_output("out", &object).unwrap();
        drop(object);

        // The producer's retained reference keeps the object alive.
        let resolved = consumer.read_input("in").unwrap();
        assert_eq!(resolved.name().as_deref(), Some("result0"));
    }

    #[test]
    fn unpublished_objects_cannot_be_sent() {
        let arena = test_arena();
        let mut ports = PortSet::new();
        ports.create_output_port("out").unwrap();
        let mut ctx = context(&arena, ports);
        ctx.set_phase(Phase::Executing);

        let object = arena
            .allocate(ObjectKind::ScalarArray, 4, ObjectMeta::new(Rank(0), ModuleId(1)))
            .unwrap();
        assert!(ctx.publish_output("out", &object).is_err());
    }

    #[test]
    #[should_panic(expected = "result published outside the executing phase")]
    fn publishing_while_idle_is_a_programming_error() {
        let arena = test_arena();
        let mut ports = PortSet::new();
        ports.create_output_port("out").unwrap();
        let mut ctx = context(&arena, ports);

        let object = arena
            .allocate(ObjectKind::ScalarArray, 1, ObjectMeta::new(Rank(0), ModuleId(1)))
            .unwrap();
        object.publish("r").unwrap();
        let _ = ctx.publish_output("out", &object);
    }

    #[test]
    fn unconnected_input_reports_missing() {
        let arena = test_arena();
        let mut ports = PortSet::new();
        ports.create_input_port("in").unwrap();
        let mut ctx = context(&arena, ports);
        assert!(matches!(
            ctx.read_input("in"),
            Err(ModuleError::MissingInput { .. })
        ));
    }

    #[test]
    fn released_object_reports_unavailable() {
        let arena = test_arena();
        let mut producer_ports = PortSet::new();
        let mut consumer_ports = PortSet::new();
        producer_ports.create_output_port("out").unwrap();
        consumer_ports.create_input_port("in").unwrap();
        PortSet::connect(&mut producer_ports, "out", &mut consumer_ports, "in").unwrap();

        let mut producer = context(&arena, producer_ports);
        let mut consumer = context(&arena, consumer_ports);
        producer.set_phase(Phase::Executing);

        let object = arena
            .allocate(ObjectKind::ScalarArray, 1, ObjectMeta::new(Rank(0), ModuleId(1)))
            .unwrap();
        object.publish("gone").unwrap();
        producer.publish_output("out", &object).unwrap();
        drop(object);
        // A new execution drops the retained reference: last holder gone.
        producer.begin_execution(ExecutionId(2));

        assert!(matches!(
            consumer.read_input("in"),
            Err(ModuleError::ObjectUnavailable { .. })
        ));
    }
}
