use crate::error::CompileError;
use crate::model::graph::{InputSlot, MechanismGraph, NodeId};
use crate::model::value::NodeValue;

/// Copies the built outputs of `id`'s producers into its input slots.
///
/// Producers come earlier in dependency order, so a missing output here means
/// the producer was never built.
pub fn resolve(graph: &mut MechanismGraph, id: NodeId) -> Result<(), CompileError> {
    let node = graph
        .node(id)
        .ok_or_else(|| CompileError::invalid(format!("node {} does not exist", id)))?;
    let consumer = node.describe(id);

    let mut resolved: Vec<(InputSlot, NodeValue)> = Vec::with_capacity(node.links.len());
    for link in &node.links {
        let value = graph
            .node(link.producer)
            .and_then(|producer| producer.kind.as_node().output(link.output))
            .ok_or_else(|| {
                CompileError::unresolved(
                    &consumer,
                    link.input.to_string(),
                    format!("output '{}' of {} is not built", link.output, link.producer),
                )
            })?;
        resolved.push((link.input, value));
    }

    if let Some(node) = graph.node_mut(id) {
        let kind = node.kind.as_node_mut();
        for (slot, value) in resolved {
            kind.set_input(slot, value);
        }
    }
    Ok(())
}
