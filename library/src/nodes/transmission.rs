use log::debug;
use serde::{Deserialize, Serialize};

use super::{MechanismNode, TWO_PI, check_finite, gate_condition};
use crate::compiler::context::NodeContext;
use crate::compiler::emit::RuleBuilder;
use crate::error::CompileError;
use crate::model::entity::MechanismEntity;
use crate::model::graph::{InputSlot, OutputSlot};
use crate::model::value::{NodeValue, OutputValue, ScalarSpec};

/// Meshes an output gear with a driving gear.
///
/// Engaged, the output turns at `input_teeth / output_teeth` of the input and is
/// shifted by a whole number of teeth (`tooth_offset`) plus a static fraction
/// (`tooth_phase`). Disengaged, it holds still while `tooth_offset` tracks the
/// whole tooth count that, together with the phase, lands nearest to the held
/// angle, so re-engaging never makes the output jump by more than half a tooth.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TransmissionNode {
    pub input_gear: MechanismEntity,
    pub input_teeth: i32,
    pub output_teeth: i32,
    /// Initial tooth phase in `[0, 1]`.
    #[serde(default)]
    pub tooth_phase: f64,
    #[serde(skip)]
    condition: Option<NodeValue>,
    #[serde(skip)]
    output: Option<OutputValue>,
}

impl TransmissionNode {
    pub fn new(input_gear: MechanismEntity, input_teeth: i32, output_teeth: i32) -> Self {
        Self {
            input_gear,
            input_teeth,
            output_teeth,
            tooth_phase: 0.0,
            condition: None,
            output: None,
        }
    }

    pub fn with_tooth_phase(mut self, tooth_phase: f64) -> Self {
        self.tooth_phase = tooth_phase;
        self
    }

    pub fn ratio(&self) -> f64 {
        self.input_teeth as f64 / self.output_teeth as f64
    }

    fn validate(&self) -> Result<(), CompileError> {
        if self.input_teeth <= 0 || self.output_teeth <= 0 {
            return Err(CompileError::invalid(format!(
                "{} needs positive teeth counts, got {}/{}",
                self.type_name(),
                self.input_teeth,
                self.output_teeth
            )));
        }
        check_finite(self.type_name(), "tooth_phase", self.tooth_phase)?;
        if !(0.0..=1.0).contains(&self.tooth_phase) {
            return Err(CompileError::invalid(format!(
                "{} tooth_phase must be in [0, 1], got {}",
                self.type_name(),
                self.tooth_phase
            )));
        }
        Ok(())
    }
}

impl MechanismNode for TransmissionNode {
    fn type_name(&self) -> &'static str {
        "TransmissionNode"
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
        self.validate()?;

        let input = ctx.rotation_of(&self.input_gear)?;
        let condition = ctx.scalar("condition", ScalarSpec::condition(1.0))?;
        let rotation = ctx.scalar("rotation", ScalarSpec::unbounded(0.0))?;
        let tooth_offset = ctx.scalar("tooth_offset", ScalarSpec::unbounded(0.0))?;
        let tooth_phase =
            ctx.parameter("tooth_phase", ScalarSpec::bounded(self.tooth_phase, 0.0, 1.0))?;
        let ratio = self.ratio();
        let teeth = self.output_teeth as f64;

        ctx.emit(
            RuleBuilder::new(
                &rotation,
                "if({cond}, {input} * {ratio} + {two_pi} * ({tooth_offset} + {tooth_phase}) / {teeth}, {rot})",
            )
            .var("cond", &condition)
            .var("input", &input)
            .number("ratio", ratio)
            .number("two_pi", TWO_PI)
            .var("tooth_offset", &tooth_offset)
            .var("tooth_phase", &tooth_phase)
            .number("teeth", teeth)
            .self_value("rot", &rotation),
        )?;

        // Reads the output rotation through self-access only, so the rotation
        // rule above may bind the offset without forming a cycle.
        ctx.emit(
            RuleBuilder::new(
                &tooth_offset,
                "if({cond}, {offset}, round({teeth} * ({rot} - {input} * {ratio}) / {two_pi} - {tooth_phase}))",
            )
            .var("cond", &condition)
            .self_value("offset", &tooth_offset)
            .number("teeth", teeth)
            .self_value("rot", &rotation)
            .var("input", &input)
            .number("ratio", ratio)
            .number("two_pi", TWO_PI)
            .var("tooth_phase", &tooth_phase),
        )?;

        gate_condition(ctx, &condition, self.condition.as_ref())?;

        debug!(
            "{}{} meshes {} at ratio {}",
            ctx.scope(),
            self.type_name(),
            self.input_gear,
            ratio
        );
        self.output = Some(OutputValue::with_condition(rotation, condition));
        Ok(())
    }

    fn reset(&mut self) {
        self.condition = None;
        self.output = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::{Axis, EntityId};

    fn driver() -> MechanismEntity {
        MechanismEntity::new(&EntityId::new("rig"), "driver", Axis::Z)
    }

    #[test]
    fn test_ratio() {
        assert_eq!(TransmissionNode::new(driver(), 40, 20).ratio(), 2.0);
        assert_eq!(TransmissionNode::new(driver(), 10, 40).ratio(), 0.25);
    }

    #[test]
    fn test_validate() {
        assert!(TransmissionNode::new(driver(), 40, 20).validate().is_ok());
        assert!(matches!(
            TransmissionNode::new(driver(), 0, 20).validate(),
            Err(CompileError::InvalidMechanism(_))
        ));
        assert!(TransmissionNode::new(driver(), 12, -3).validate().is_err());
        assert!(
            TransmissionNode::new(driver(), 12, 12)
                .with_tooth_phase(1.5)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_from_json_defaults_phase() {
        let json = r#"{
            "input_gear": { "body": { "entity": "rig", "name": "driver" }, "axis": "z" },
            "input_teeth": 12,
            "output_teeth": 36
        }"#;
        let node: TransmissionNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.tooth_phase, 0.0);
        assert_eq!(node.input_gear, driver());
    }
}
