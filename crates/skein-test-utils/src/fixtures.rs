//! Reusable module fixtures.
//!
//! Three standard modules for lifecycle and pipeline testing:
//!
//! - [`ConstModule`] — publishes a constant-valued scalar array per task.
//! - [`IdentityModule`] — deep-copies its input object to its output.
//! - [`FailingModule`] — fails deterministically after N compute calls.

use std::sync::atomic::{AtomicUsize, Ordering};

use skein_core::{ModuleError, ObjectKind, ObjectMeta};
use skein_module::{ComputeContext, ComputeTask, Module, ReducePolicy};
use skein_object::clone_object;

/// Publishes a scalar array filled with a constant on every compute.
///
/// Useful for testing pipeline routing: downstream modules receive a
/// payload whose value identifies the producer.
pub struct ConstModule {
    pub name: String,
    pub output: String,
    pub value: f32,
    pub len: u32,
}

impl ConstModule {
    pub fn new(name: impl Into<String>, output: impl Into<String>, value: f32, len: u32) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
            value,
            len,
        }
    }
}

impl Module for ConstModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn compute(&mut self, ctx: &mut ComputeContext, task: &ComputeTask) -> Result<(), ModuleError> {
        let meta = ObjectMeta::new(ctx.rank(), ctx.module_id()).with_timestep(task.timestep);
        let object = ctx
            .arena()
            .allocate(ObjectKind::ScalarArray, self.len, meta)
            .map_err(|err| ModuleError::failed(err.to_string()))?;
        object.write().fill(self.value);
        let name = ObjectKind::ScalarArray.derive_name(object.id());
        object
            .publish(&name)
            .map_err(|err| ModuleError::failed(err.to_string()))?;
        ctx.publish_output(&self.output, &object)
    }
}

/// Deep-copies each object from its input port to its output port.
///
/// If the copy matches the original downstream, ports, arena storage,
/// and retention are all working.
pub struct IdentityModule {
    pub name: String,
    pub input: String,
    pub output: String,
}

impl IdentityModule {
    pub fn new(
        name: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            output: output.into(),
        }
    }
}

impl Module for IdentityModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn compute(&mut self, ctx: &mut ComputeContext, _task: &ComputeTask) -> Result<(), ModuleError> {
        let source = ctx.read_input(&self.input)?;
        let copy = clone_object(ctx.arena(), &source)
            .map_err(|err| ModuleError::failed(err.to_string()))?;
        let name = copy.kind().derive_name(copy.id());
        copy.publish(&name)
            .map_err(|err| ModuleError::failed(err.to_string()))?;
        ctx.publish_output(&self.output, &copy)
    }
}

/// Succeeds for the first `fail_after` compute calls, then fails every
/// call with a deterministic message.
pub struct FailingModule {
    pub name: String,
    pub fail_after: usize,
    calls: AtomicUsize,
    policy: ReducePolicy,
}

impl FailingModule {
    pub fn new(name: impl Into<String>, fail_after: usize) -> Self {
        Self {
            name: name.into(),
            fail_after,
            calls: AtomicUsize::new(0),
            policy: ReducePolicy::Never,
        }
    }

    /// Same fixture with a different reduce policy.
    pub fn with_policy(mut self, policy: ReducePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Compute calls observed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Module for FailingModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn reduce_policy(&self) -> ReducePolicy {
        self.policy
    }

    fn compute(&mut self, _ctx: &mut ComputeContext, task: &ComputeTask) -> Result<(), ModuleError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.fail_after {
            return Err(ModuleError::failed(format!(
                "scripted failure at timestep {}",
                task.timestep
            )));
        }
        Ok(())
    }
}
