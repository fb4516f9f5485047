//! Declarative mechanism graph.
//!
//! Nodes are stored in a flat list and addressed by index. Links are declared on
//! the consuming node and name the producer by index, so a graph round-trips
//! through JSON without any pointer fixup.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CompileError;
use crate::nodes::{
    ConstRotationNode, GearNode, MechanismNode, RangeConditionNode, TransmissionNode,
};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Named input field of a consuming node.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InputSlot {
    Rotation,
    Condition,
}

impl InputSlot {
    /// Output kind this input consumes: rotations feed rotations and gates
    /// feed gates.
    pub fn takes(self, output: OutputSlot) -> bool {
        matches!(
            (self, output),
            (InputSlot::Rotation, OutputSlot::Rotation)
                | (InputSlot::Condition, OutputSlot::Condition)
        )
    }
}

impl fmt::Display for InputSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSlot::Rotation => f.write_str("rotation"),
            InputSlot::Condition => f.write_str("condition"),
        }
    }
}

/// Named output field of a producing node.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OutputSlot {
    Rotation,
    Condition,
}

impl fmt::Display for OutputSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputSlot::Rotation => f.write_str("rotation"),
            OutputSlot::Condition => f.write_str("condition"),
        }
    }
}

/// `consumer.input ← producer.output`
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Link {
    pub input: InputSlot,
    pub producer: NodeId,
    pub output: OutputSlot,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "node_type")]
pub enum NodeKind {
    Gear(GearNode),
    ConstRotation(ConstRotationNode),
    Transmission(TransmissionNode),
    RangeCondition(RangeConditionNode),
}

impl NodeKind {
    pub fn as_node(&self) -> &dyn MechanismNode {
        match self {
            NodeKind::Gear(n) => n,
            NodeKind::ConstRotation(n) => n,
            NodeKind::Transmission(n) => n,
            NodeKind::RangeCondition(n) => n,
        }
    }

    pub fn as_node_mut(&mut self) -> &mut dyn MechanismNode {
        match self {
            NodeKind::Gear(n) => n,
            NodeKind::ConstRotation(n) => n,
            NodeKind::Transmission(n) => n,
            NodeKind::RangeCondition(n) => n,
        }
    }
}

impl From<GearNode> for NodeKind {
    fn from(node: GearNode) -> Self {
        NodeKind::Gear(node)
    }
}

impl From<ConstRotationNode> for NodeKind {
    fn from(node: ConstRotationNode) -> Self {
        NodeKind::ConstRotation(node)
    }
}

impl From<TransmissionNode> for NodeKind {
    fn from(node: TransmissionNode) -> Self {
        NodeKind::Transmission(node)
    }
}

impl From<RangeConditionNode> for NodeKind {
    fn from(node: RangeConditionNode) -> Self {
        NodeKind::RangeCondition(node)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: NodeKind,
    #[serde(default)]
    pub links: Vec<Link>,
    /// Namespace label assigned by the compiler; `None` until built.
    #[serde(skip)]
    pub scope: Option<String>,
}

impl Node {
    pub fn new(kind: impl Into<NodeKind>) -> Self {
        Self {
            label: None,
            kind: kind.into(),
            links: Vec::new(),
            scope: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.as_node().type_name()
    }

    pub fn is_sink(&self) -> bool {
        self.kind.as_node().is_sink()
    }

    /// Human readable name used in diagnostics.
    pub fn describe(&self, id: NodeId) -> String {
        match &self.label {
            Some(label) => format!("{} {} '{}'", self.type_name(), id, label),
            None => format!("{} {}", self.type_name(), id),
        }
    }

    /// Drops scope, resolved inputs and built outputs.
    pub fn reset(&mut self) {
        self.scope = None;
        self.kind.as_node_mut().reset();
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct MechanismGraph {
    pub nodes: Vec<Node>,
}

impl MechanismGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: impl Into<NodeKind>) -> NodeId {
        self.add_node(Node::new(kind))
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Declares `consumer.input ← producer.output`. The producer is only checked
    /// when the graph is compiled.
    pub fn link(
        &mut self,
        consumer: NodeId,
        input: InputSlot,
        producer: NodeId,
        output: OutputSlot,
    ) -> Result<(), CompileError> {
        let node = self.node_mut(consumer).ok_or_else(|| {
            CompileError::unresolved(consumer.to_string(), input.to_string(), "no such node")
        })?;
        node.links.push(Link {
            input,
            producer,
            output,
        });
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sink nodes in declaration order.
    pub fn anchors(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_sink())
            .map(|(index, _)| NodeId(index))
            .collect()
    }

    pub fn scope(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(|n| n.scope.as_deref())
    }

    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.reset();
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
