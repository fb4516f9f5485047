//! Dependency ordering of the nodes feeding one gear.

use std::collections::HashMap;

use crate::error::CompileError;
use crate::model::graph::{MechanismGraph, NodeId};

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

/// Returns the expression nodes reachable from `anchor` with every producer
/// before its consumers, followed by the anchor itself.
///
/// Depth-first post-order over links in declaration order, so the result is
/// deterministic. Links are checked on the way: the producer must exist, must
/// not be a sink and must provide the linked output, the consumer must accept
/// the linked input, and every required input must be linked exactly once.
pub fn gather(graph: &MechanismGraph, anchor: NodeId) -> Result<Vec<NodeId>, CompileError> {
    let node = graph
        .node(anchor)
        .ok_or_else(|| CompileError::invalid(format!("anchor {} does not exist", anchor)))?;
    if !node.is_sink() {
        return Err(CompileError::invalid(format!(
            "{} is not a gear and cannot anchor a compile",
            node.describe(anchor)
        )));
    }

    let mut marks = HashMap::new();
    let mut sorted = Vec::new();
    visit(graph, anchor, &mut marks, &mut sorted)?;
    Ok(sorted)
}

fn visit(
    graph: &MechanismGraph,
    id: NodeId,
    marks: &mut HashMap<NodeId, Mark>,
    sorted: &mut Vec<NodeId>,
) -> Result<(), CompileError> {
    match marks.get(&id) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let node = graph
                .node(id)
                .map(|n| n.describe(id))
                .unwrap_or_else(|| id.to_string());
            return Err(CompileError::GraphCycle { id, node });
        }
        None => {}
    }
    marks.insert(id, Mark::Visiting);

    let node = graph
        .node(id)
        .ok_or_else(|| CompileError::invalid(format!("node {} does not exist", id)))?;
    let consumer = node.describe(id);
    let kind = node.kind.as_node();

    for (index, link) in node.links.iter().enumerate() {
        if !kind.accepts(link.input) {
            return Err(CompileError::unresolved(
                &consumer,
                link.input.to_string(),
                format!("{} has no such input", node.type_name()),
            ));
        }
        if node.links[..index].iter().any(|l| l.input == link.input) {
            return Err(CompileError::unresolved(
                &consumer,
                link.input.to_string(),
                "input is linked more than once",
            ));
        }

        let producer = graph.node(link.producer).ok_or_else(|| {
            CompileError::unresolved(
                &consumer,
                link.input.to_string(),
                format!("producer {} does not exist", link.producer),
            )
        })?;
        if producer.is_sink() {
            return Err(CompileError::unresolved(
                &consumer,
                link.input.to_string(),
                format!("{} is a sink and has no outputs", producer.describe(link.producer)),
            ));
        }
        if !producer.kind.as_node().provides(link.output) {
            return Err(CompileError::unresolved(
                &consumer,
                link.input.to_string(),
                format!(
                    "{} has no output '{}'",
                    producer.describe(link.producer),
                    link.output
                ),
            ));
        }

        if !link.input.takes(link.output) {
            return Err(CompileError::unresolved(
                &consumer,
                link.input.to_string(),
                format!(
                    "{} output '{}' cannot feed a {} input",
                    producer.describe(link.producer),
                    link.output,
                    link.input
                ),
            ));
        }

        visit(graph, link.producer, marks, sorted)?;
    }

    for required in kind.required_inputs() {
        if !node.links.iter().any(|l| l.input == *required) {
            return Err(CompileError::unresolved(
                &consumer,
                required.to_string(),
                "required input is not linked",
            ));
        }
    }

    marks.insert(id, Mark::Done);
    sorted.push(id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;
    use crate::model::entity::{Axis, EntityId, MechanismEntity};
    use crate::model::graph::{InputSlot, OutputSlot};
    use crate::nodes::{ConstRotationNode, GearNode, RangeConditionNode, TransmissionNode};

    fn gear(name: &str) -> MechanismEntity {
        MechanismEntity::new(&EntityId::new("rig"), name, Axis::Z)
    }

    #[test]
    fn test_producers_before_consumers() {
        let mut graph = MechanismGraph::new();
        let anchor = graph.add(GearNode::new(gear("out")));
        let trans = graph.add(TransmissionNode::new(gear("in"), 40, 20));
        let range = graph.add(RangeConditionNode::new(gear("cam"), 0.0, PI));
        graph
            .link(anchor, InputSlot::Rotation, trans, OutputSlot::Rotation)
            .unwrap();
        graph
            .link(trans, InputSlot::Condition, range, OutputSlot::Condition)
            .unwrap();

        assert_eq!(gather(&graph, anchor).unwrap(), vec![range, trans, anchor]);
    }

    #[test]
    fn test_shared_producer_visited_once() {
        let mut graph = MechanismGraph::new();
        let motor = graph.add(ConstRotationNode::new(0.1));
        let anchor = graph.add(GearNode::new(gear("out")));
        graph
            .link(anchor, InputSlot::Rotation, motor, OutputSlot::Rotation)
            .unwrap();
        graph
            .link(anchor, InputSlot::Condition, motor, OutputSlot::Condition)
            .unwrap();

        assert_eq!(gather(&graph, anchor).unwrap(), vec![motor, anchor]);
    }

    #[test]
    fn test_cycle() {
        let mut graph = MechanismGraph::new();
        let a = graph.add(TransmissionNode::new(gear("in"), 10, 10));
        let b = graph.add(TransmissionNode::new(gear("in"), 10, 10));
        let anchor = graph.add(GearNode::new(gear("out")));
        graph
            .link(anchor, InputSlot::Rotation, a, OutputSlot::Rotation)
            .unwrap();
        graph
            .link(a, InputSlot::Condition, b, OutputSlot::Condition)
            .unwrap();
        graph
            .link(b, InputSlot::Condition, a, OutputSlot::Condition)
            .unwrap();

        let err = gather(&graph, anchor).unwrap_err();
        assert!(matches!(err, CompileError::GraphCycle { id, .. } if id == a));
    }

    #[test]
    fn test_sink_producer_rejected() {
        let mut graph = MechanismGraph::new();
        let first = graph.add(GearNode::new(gear("a")));
        let second = graph.add(GearNode::new(gear("b")));
        graph
            .link(second, InputSlot::Rotation, first, OutputSlot::Rotation)
            .unwrap();
        assert!(matches!(
            gather(&graph, second),
            Err(CompileError::UnresolvedLink { .. })
        ));
    }

    #[test]
    fn test_missing_output_and_input() {
        let mut graph = MechanismGraph::new();
        let range = graph.add(RangeConditionNode::new(gear("cam"), 0.0, PI));
        let anchor = graph.add(GearNode::new(gear("out")));
        graph
            .link(anchor, InputSlot::Rotation, range, OutputSlot::Rotation)
            .unwrap();
        assert!(matches!(
            gather(&graph, anchor),
            Err(CompileError::UnresolvedLink { .. })
        ));

        let mut graph = MechanismGraph::new();
        let motor = graph.add(ConstRotationNode::new(0.1));
        let other = graph.add(ConstRotationNode::new(0.1));
        let anchor = graph.add(GearNode::new(gear("out")));
        graph
            .link(anchor, InputSlot::Rotation, motor, OutputSlot::Rotation)
            .unwrap();
        graph
            .link(motor, InputSlot::Rotation, other, OutputSlot::Rotation)
            .unwrap();
        assert!(matches!(
            gather(&graph, anchor),
            Err(CompileError::UnresolvedLink { input, .. }) if input == "rotation"
        ));
    }

    #[test]
    fn test_link_kinds_must_match() {
        let mut graph = MechanismGraph::new();
        let anchor = graph.add(GearNode::new(gear("out")));
        let trans = graph.add(TransmissionNode::new(gear("in"), 10, 10));
        let other = graph.add(TransmissionNode::new(gear("in"), 20, 10));
        graph
            .link(anchor, InputSlot::Rotation, trans, OutputSlot::Rotation)
            .unwrap();
        graph
            .link(trans, InputSlot::Condition, other, OutputSlot::Rotation)
            .unwrap();
        assert!(matches!(
            gather(&graph, anchor),
            Err(CompileError::UnresolvedLink { input, reason, .. })
                if input == "condition" && reason.contains("cannot feed")
        ));

        let mut graph = MechanismGraph::new();
        let range = graph.add(RangeConditionNode::new(gear("cam"), 0.0, PI));
        let anchor = graph.add(GearNode::new(gear("out")));
        graph
            .link(anchor, InputSlot::Rotation, range, OutputSlot::Condition)
            .unwrap();
        assert!(matches!(
            gather(&graph, anchor),
            Err(CompileError::UnresolvedLink { input, .. }) if input == "rotation"
        ));
    }

    #[test]
    fn test_required_input() {
        let mut graph = MechanismGraph::new();
        let anchor = graph.add(GearNode::new(gear("out")));
        assert!(matches!(
            gather(&graph, anchor),
            Err(CompileError::UnresolvedLink { reason, .. }) if reason.contains("required")
        ));
    }

    #[test]
    fn test_anchor_must_be_sink() {
        let mut graph = MechanismGraph::new();
        let motor = graph.add(ConstRotationNode::new(0.1));
        assert!(matches!(
            gather(&graph, motor),
            Err(CompileError::InvalidMechanism(_))
        ));
    }
}
