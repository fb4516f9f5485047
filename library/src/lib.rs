//! Compiles interlocked gear mechanisms into per-frame driver expressions for a
//! reactive animation host.

pub mod backend;
pub mod compiler;
pub mod config;
pub mod error;
pub mod model;
pub mod nodes;
pub mod util;

use std::fs;
use std::path::Path;

pub use backend::{Backend, ExpressionId, Namespace};
pub use compiler::Compiler;
pub use config::{CompilerConfig, GearsimConfig, HostConfig};
pub use error::{BackendError, CompileError, GearsimError};
pub use model::{
    Axis, EntityId, InputSlot, MechanismEntity, MechanismGraph, NodeId, OutputSlot, Rule,
};
pub use nodes::{ConstRotationNode, GearNode, MechanismNode, RangeConditionNode, TransmissionNode};

#[cfg(feature = "memory-backend")]
pub use backend::memory::MemoryBackend;

/// Reads a mechanism graph from a JSON file.
pub fn load_graph(path: &Path) -> Result<MechanismGraph, GearsimError> {
    let text = fs::read_to_string(path)?;
    let graph = MechanismGraph::from_json(&text)?;
    log::debug!("Loaded {} nodes from {}", graph.len(), path.display());
    Ok(graph)
}
