use serde::{Deserialize, Serialize};

use super::MechanismNode;
use crate::compiler::context::NodeContext;
use crate::compiler::emit::RuleBuilder;
use crate::error::CompileError;
use crate::model::entity::MechanismEntity;
use crate::model::graph::{InputSlot, OutputSlot};
use crate::model::value::NodeValue;

/// Sink that drives a gear's live rotation.
///
/// If a condition is linked it drives the companion condition of the rotation
/// input, which is how a clutch engages or frees the upstream node.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GearNode {
    pub target: MechanismEntity,
    #[serde(skip)]
    input_value: Option<NodeValue>,
    #[serde(skip)]
    condition_value: Option<NodeValue>,
}

impl GearNode {
    pub fn new(target: MechanismEntity) -> Self {
        Self {
            target,
            input_value: None,
            condition_value: None,
        }
    }
}

impl MechanismNode for GearNode {
    fn type_name(&self) -> &'static str {
        "GearNode"
    }

    fn inputs(&self) -> &'static [InputSlot] {
        &[InputSlot::Rotation, InputSlot::Condition]
    }

    fn required_inputs(&self) -> &'static [InputSlot] {
        &[InputSlot::Rotation]
    }

    fn set_input(&mut self, slot: InputSlot, value: NodeValue) {
        match slot {
            InputSlot::Rotation => self.input_value = Some(value),
            InputSlot::Condition => self.condition_value = Some(value),
        }
    }

    fn output(&self, _slot: OutputSlot) -> Option<NodeValue> {
        None
    }

    fn build(&mut self, ctx: &mut NodeContext<'_, '_>) -> Result<(), CompileError> {
        let input = self.input_value.as_ref().ok_or_else(|| {
            CompileError::unresolved(self.type_name(), InputSlot::Rotation.to_string(), "not linked")
        })?;

        let rotation = ctx.rotation_of(&self.target)?;
        ctx.emit(RuleBuilder::new(&rotation, "{gear_rotation}").var("gear_rotation", input))?;

        if let Some(condition) = &self.condition_value {
            let companion = input.condition().ok_or_else(|| {
                CompileError::invalid(format!(
                    "{} on {} has a condition but its input carries none",
                    self.type_name(),
                    self.target
                ))
            })?;
            ctx.emit(RuleBuilder::new(companion, "{cond}").var("cond", condition))?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.input_value = None;
        self.condition_value = None;
    }

    fn is_sink(&self) -> bool {
        true
    }
}
