//! Node catalog.
//!
//! Every node type turns its parameters and resolved inputs into scalars and
//! rules through a [`NodeContext`]. Only [`GearNode`] writes a live rotation;
//! all other nodes are expression nodes that feed it.

mod const_rotation;
mod gear;
mod range_condition;
mod transmission;

pub use const_rotation::ConstRotationNode;
pub use gear::GearNode;
pub use range_condition::RangeConditionNode;
pub use transmission::TransmissionNode;

use std::f64::consts::TAU;

use crate::compiler::context::NodeContext;
use crate::compiler::emit::RuleBuilder;
use crate::error::CompileError;
use crate::model::graph::{InputSlot, OutputSlot};
use crate::model::value::{NodeValue, ScalarValue};

pub(crate) const TWO_PI: f64 = TAU;

pub trait MechanismNode {
    fn type_name(&self) -> &'static str;

    /// Input slots a link may target.
    fn inputs(&self) -> &'static [InputSlot] {
        &[]
    }

    /// Inputs that must be linked before the node can be built.
    fn required_inputs(&self) -> &'static [InputSlot] {
        &[]
    }

    /// Output slots this node provides once built.
    fn outputs(&self) -> &'static [OutputSlot] {
        &[]
    }

    fn accepts(&self, slot: InputSlot) -> bool {
        self.inputs().contains(&slot)
    }

    fn provides(&self, slot: OutputSlot) -> bool {
        self.outputs().contains(&slot)
    }

    /// Stores a resolved link value. Slots outside [`inputs`](Self::inputs) are
    /// ignored.
    fn set_input(&mut self, slot: InputSlot, value: NodeValue);

    /// Output value, `None` until built.
    fn output(&self, _slot: OutputSlot) -> Option<NodeValue> {
        None
    }

    fn build(&mut self, ctx: &mut NodeContext<'_, '_>) -> Result<(), CompileError>;

    /// Drops resolved inputs and built outputs.
    fn reset(&mut self);

    fn is_sink(&self) -> bool {
        false
    }
}

/// Drives a node's own condition scalar from a linked gate value.
pub(crate) fn gate_condition(
    ctx: &mut NodeContext<'_, '_>,
    condition: &ScalarValue,
    gate: Option<&NodeValue>,
) -> Result<(), CompileError> {
    if let Some(gate) = gate {
        ctx.emit(RuleBuilder::new(condition, "{gate}").var("gate", gate))?;
    }
    Ok(())
}

pub(crate) fn check_finite(node: &str, name: &str, value: f64) -> Result<(), CompileError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CompileError::invalid(format!(
            "{} {} must be finite, got {}",
            node, name, value
        )))
    }
}
