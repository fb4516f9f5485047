use serde::{Deserialize, Serialize};

use super::{MechanismNode, TWO_PI, check_finite};
use crate::compiler::context::NodeContext;
use crate::compiler::emit::RuleBuilder;
use crate::error::CompileError;
use crate::model::entity::MechanismEntity;
use crate::model::graph::{InputSlot, OutputSlot};
use crate::model::value::{NodeValue, ScalarSpec, ScalarValue};

/// Stateless gate: `1.0` while a gear's angle lies in `[start_angle, stop_angle)`
/// modulo one revolution, `0.0` otherwise. A range with `start > stop` wraps
/// through zero.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RangeConditionNode {
    pub gear: MechanismEntity,
    pub start_angle: f64,
    pub stop_angle: f64,
    #[serde(skip)]
    output: Option<ScalarValue>,
}

impl RangeConditionNode {
    pub fn new(gear: MechanismEntity, start_angle: f64, stop_angle: f64) -> Self {
        Self {
            gear,
            start_angle,
            stop_angle,
            output: None,
        }
    }

    /// Start and stop as fractions of a revolution in `[0, 1)`.
    pub fn fractions(&self) -> (f64, f64) {
        (
            revolution_fraction(self.start_angle),
            revolution_fraction(self.stop_angle),
        )
    }

    pub fn wraps(&self) -> bool {
        let (start, stop) = self.fractions();
        start > stop
    }
}

fn revolution_fraction(angle: f64) -> f64 {
    let fraction = (angle / TWO_PI).rem_euclid(1.0);
    // rem_euclid rounds tiny negative angles up to exactly one turn
    if fraction >= 1.0 { 0.0 } else { fraction }
}

impl MechanismNode for RangeConditionNode {
    fn type_name(&self) -> &'static str {
        "RangeConditionNode"
    }

    fn outputs(&self) -> &'static [OutputSlot] {
        &[OutputSlot::Condition]
    }

    fn set_input(&mut self, _slot: InputSlot, _value: NodeValue) {}

    fn output(&self, slot: OutputSlot) -> Option<NodeValue> {
        match slot {
            OutputSlot::Condition => self.output.clone().map(NodeValue::from),
            OutputSlot::Rotation => None,
        }
    }

    fn build(&mut self, ctx: &mut NodeContext<'_, '_>) -> Result<(), CompileError> {
        check_finite(self.type_name(), "start_angle", self.start_angle)?;
        check_finite(self.type_name(), "stop_angle", self.stop_angle)?;

        let input = ctx.rotation_of(&self.gear)?;
        let condition = ctx.scalar("condition", ScalarSpec::condition(0.0))?;
        let (start, stop) = self.fractions();
        let join = if self.wraps() { "||" } else { "&&" };

        ctx.emit(
            RuleBuilder::new(
                &condition,
                "if({input} * {k} - floor({input} * {k}) >= {start} {join} \
                 {input} * {k} - floor({input} * {k}) < {stop}, 1.0, 0.0)",
            )
            .var("input", &input)
            .number("k", 1.0 / TWO_PI)
            .number("start", start)
            .literal("join", join)
            .number("stop", stop),
        )?;

        self.output = Some(condition);
        Ok(())
    }

    fn reset(&mut self) {
        self.output = None;
    }
}
