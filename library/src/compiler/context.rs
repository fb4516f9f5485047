use crate::backend::ExpressionId;
use crate::error::CompileError;
use crate::model::entity::{EntityId, MechanismEntity, PropertyOwner};
use crate::model::value::{FrameDeltaValue, RotationValue, ScalarSpec, ScalarValue};

use super::emit::{Emitter, RuleBuilder};

/// Everything a node needs to turn itself into rules: its scope, the gear its
/// state is stored on and the shared frame timing of that gear's entity.
pub struct NodeContext<'a, 'b> {
    scope: String,
    target: MechanismEntity,
    frame_delta: FrameDeltaValue,
    emitter: &'a mut Emitter<'b>,
}

impl<'a, 'b> NodeContext<'a, 'b> {
    pub fn new(
        scope: String,
        target: MechanismEntity,
        frame_delta: FrameDeltaValue,
        emitter: &'a mut Emitter<'b>,
    ) -> Self {
        Self {
            scope,
            target,
            frame_delta,
            emitter,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn entity(&self) -> &EntityId {
        self.target.entity()
    }

    /// Live rotation of the target gear.
    pub fn current_value(&self) -> RotationValue {
        RotationValue::new(self.target.clone())
    }

    pub fn frame_delta(&self) -> &FrameDeltaValue {
        &self.frame_delta
    }

    /// Node state scalar, stored on the target body under this node's scope.
    pub fn scalar(&mut self, name: &str, spec: ScalarSpec) -> Result<ScalarValue, CompileError> {
        let owner = PropertyOwner::Body(self.target.body.clone());
        let scoped = format!("{}{}", self.scope, name);
        self.emitter.scalar(owner, &scoped, spec)
    }

    /// User-tunable scalar, stored on the entity under this node's scope.
    pub fn parameter(&mut self, name: &str, spec: ScalarSpec) -> Result<ScalarValue, CompileError> {
        let owner = PropertyOwner::Entity(self.entity().clone());
        let scoped = format!("{}{}", self.scope, name);
        self.emitter.scalar(owner, &scoped, spec)
    }

    /// Live rotation of another gear. Expressions can only bind bodies of the
    /// entity being compiled.
    pub fn rotation_of(&mut self, gear: &MechanismEntity) -> Result<RotationValue, CompileError> {
        if gear.entity() != self.entity() {
            return Err(CompileError::invalid(format!(
                "{} is outside entity {}",
                gear,
                self.entity()
            )));
        }
        self.emitter.rotation_ref(gear)?;
        Ok(RotationValue::new(gear.clone()))
    }

    pub fn emit(&mut self, builder: RuleBuilder) -> Result<ExpressionId, CompileError> {
        self.emitter.emit(builder)
    }
}
