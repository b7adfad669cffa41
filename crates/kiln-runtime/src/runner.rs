//! One complete load cycle.
//!
//! [`run_method`] walks every state of a load cycle in order: reserve the
//! arena, allocate planned buffers, assemble the memory manager, bind the
//! method, prepare inputs, hand the method to the caller, and release
//! everything in reverse. Nothing outlives the call except what the
//! caller's closure returns.

use std::sync::Once;

use kiln_arena::{MemoryManager, MetadataArena, PlannedBufferSet};
use kiln_core::BufferId;
use kiln_program::Program;
use tracing::{debug, info};

use crate::config::{InputPolicy, RuntimeConfig};
use crate::error::RuntimeError;
use crate::inputs::prepare_input_tensors;
use crate::method::Method;
use crate::profile::ProfileResult;
use crate::value::OwnedValue;

static INIT: Once = Once::new();

/// Once-per-process runtime initialisation. Safe to call repeatedly and
/// from several threads; only the first call does any work.
pub fn runtime_init() {
    INIT.call_once(|| {
        info!(version = env!("CARGO_PKG_VERSION"), "kiln runtime initialised");
    });
}

/// Whether [`runtime_init`] has completed.
pub fn is_initialized() -> bool {
    INIT.is_completed()
}

/// Run `f` against method `name` of `program`, bound to freshly reserved
/// memory sized by `config` and the method's metadata.
pub fn run_method<R>(
    program: &Program,
    name: &str,
    config: &RuntimeConfig,
    f: impl FnOnce(&mut Method<'_>) -> Result<R, RuntimeError>,
) -> Result<R, RuntimeError> {
    runtime_init();
    config.validate()?;

    let meta = program.method_meta(name)?;
    let mut arena = MetadataArena::from_config(&config.arena_config())?;
    let mut planned = PlannedBufferSet::from_meta(&meta)?;
    for id in BufferId::first(planned.len()).into_iter().flatten() {
        debug!(id = id.0, size = planned.size(id).unwrap_or(0), "setting up planned buffer");
    }

    let manager = MemoryManager::new(&mut arena, planned.as_view());
    let mut method = Method::load(program, name, manager)?;
    if config.profiling {
        method.enable_profiling()?;
    }
    if config.input_policy == InputPolicy::Ones {
        prepare_input_tensors(&mut method)?;
    }

    let out = f(&mut method)?;
    Ok(out)
}

/// Outputs and profile of one [`run_forward`] call.
#[derive(Clone, Debug, PartialEq)]
pub struct ForwardResult {
    /// Every output, copied out of method memory.
    pub outputs: Vec<OwnedValue>,
    /// Profiling data; empty unless profiling was enabled.
    pub profile: ProfileResult,
}

/// Bind, execute once, and copy every output out.
pub fn run_forward(
    program: &Program,
    name: &str,
    config: &RuntimeConfig,
) -> Result<ForwardResult, RuntimeError> {
    run_method(program, name, config, |method| {
        method.execute()?;
        let outputs = (0..method.outputs_size())
            .map(|i| method.output(i).map(|v| v.to_owned_value()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ForwardResult {
            outputs,
            profile: method.profile_result(),
        })
    })
}
