use serde::{Deserialize, Serialize};

use super::{MechanismNode, check_finite, gate_condition};
use crate::compiler::context::NodeContext;
use crate::compiler::emit::RuleBuilder;
use crate::error::CompileError;
use crate::model::graph::{InputSlot, OutputSlot};
use crate::model::value::{NodeValue, OutputValue, ScalarSpec, ValueRef};

/// Independent rotation source turning at a constant, user-tunable speed in
/// radians per frame.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ConstRotationNode {
    pub default_speed: f64,
    #[serde(skip)]
    condition: Option<NodeValue>,
    #[serde(skip)]
    output: Option<OutputValue>,
}

impl ConstRotationNode {
    pub fn new(default_speed: f64) -> Self {
        Self {
            default_speed,
            ..Default::default()
        }
    }
}

impl MechanismNode for ConstRotationNode {
    fn type_name(&self) -> &'static str {
        "ConstRotationNode"
    }

    fn inputs(&self) -> &'static [InputSlot] {
        &[InputSlot::Condition]
    }

    fn outputs(&self) -> &'static [OutputSlot] {
        &[OutputSlot::Rotation, OutputSlot::Condition]
    }

    fn set_input(&mut self, slot: InputSlot, value: NodeValue) {
        if slot == InputSlot::Condition {
            self.condition = Some(value);
        }
    }

    fn output(&self, slot: OutputSlot) -> Option<NodeValue> {
        let output = self.output.as_ref()?;
        match slot {
            OutputSlot::Rotation => Some(output.clone().into()),
            OutputSlot::Condition => output.condition().cloned().map(NodeValue::from),
        }
    }

    fn build(&mut self, ctx: &mut NodeContext<'_, '_>) -> Result<(), CompileError> {
        check_finite(self.type_name(), "default_speed", self.default_speed)?;

        let condition = ctx.scalar("condition", ScalarSpec::condition(1.0))?;
        let rotation = ctx.scalar("rotation", ScalarSpec::unbounded(0.0))?;
        let speed = ctx.parameter("speed", ScalarSpec::unbounded(self.default_speed))?;

        // Disengaged, the integrator follows the gear so it resumes from where
        // the gear was left.
        let integrate = RuleBuilder::new(
            &rotation,
            "if({cond}, {curval} + {speed} * {delta}, {live})",
        )
        .var("cond", &condition)
        .self_value("curval", &rotation)
        .var("speed", &speed)
        .var("delta", ctx.frame_delta())
        .literal("live", ctx.current_value().self_path());
        ctx.emit(integrate)?;

        gate_condition(ctx, &condition, self.condition.as_ref())?;

        self.output = Some(OutputValue::with_condition(rotation, condition));
        Ok(())
    }

    fn reset(&mut self) {
        self.condition = None;
        self.output = None;
    }
}
