//! Typed references to host scalars.
//!
//! A `NodeValue` never holds a number. It names a host property that a rule can
//! bind as a variable, drive with its own rule, or read through self-access.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::entity::{Axis, BodyHandle, EntityId, MechanismEntity, PropertyOwner};

/// Name of the per-entity frame delta scalar.
pub const FRAME_DELTA_PROP: &str = "frame_delta";
/// Name of the per-entity previous frame scalar.
pub const FRAME_PREV_PROP: &str = "frame_prev";

/// A host property as addressed by rules and bindings.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyRef {
    /// Stored scalar, `name` is already scoped.
    Scalar { owner: PropertyOwner, name: String },
    /// Live rotation of a body around one axis.
    Rotation { body: BodyHandle, axis: Axis },
}

impl PropertyRef {
    pub fn scalar(owner: PropertyOwner, name: &str) -> Self {
        PropertyRef::Scalar {
            owner,
            name: name.to_string(),
        }
    }

    pub fn rotation(entity: &MechanismEntity) -> Self {
        PropertyRef::Rotation {
            body: entity.body.clone(),
            axis: entity.axis,
        }
    }

    /// The object whose properties a self-access read on this property sees.
    pub fn owner(&self) -> PropertyOwner {
        match self {
            PropertyRef::Scalar { owner, .. } => owner.clone(),
            PropertyRef::Rotation { body, .. } => PropertyOwner::Body(body.clone()),
        }
    }

    pub fn entity(&self) -> &EntityId {
        match self {
            PropertyRef::Scalar { owner, .. } => owner.entity(),
            PropertyRef::Rotation { body, .. } => &body.entity,
        }
    }

    /// Expression path reading the last committed value through self-access.
    pub fn self_path(&self) -> String {
        match self {
            PropertyRef::Scalar { name, .. } => format!("self.{}", name),
            PropertyRef::Rotation { axis, .. } => format!("self.rotation_{}", axis),
        }
    }
}

impl fmt::Display for PropertyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyRef::Scalar { owner, name } => write!(f, "{}[\"{}\"]", owner, name),
            PropertyRef::Rotation { body, axis } => write!(f, "{}.rotation_{}", body, axis),
        }
    }
}

/// Default and hard bounds of a stored scalar.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ScalarSpec {
    pub default: f64,
    pub min: f64,
    pub max: f64,
}

impl ScalarSpec {
    pub fn unbounded(default: f64) -> Self {
        Self {
            default,
            min: -f64::MAX,
            max: f64::MAX,
        }
    }

    pub fn bounded(default: f64, min: f64, max: f64) -> Self {
        Self { default, min, max }
    }

    /// Condition scalars are gates in `[0, 1]`.
    pub fn condition(default: f64) -> Self {
        Self::bounded(default, 0.0, 1.0)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.default.is_finite() {
            return Err(format!("default {} is not finite", self.default));
        }
        if self.min.is_nan() || self.max.is_nan() {
            return Err("bounds must not be NaN".to_string());
        }
        if !(self.min <= self.default && self.default <= self.max) {
            return Err(format!(
                "expected min <= default <= max, got {} <= {} <= {}",
                self.min, self.default, self.max
            ));
        }
        Ok(())
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Anything that names a host property.
pub trait ValueRef {
    fn property(&self) -> PropertyRef;

    fn self_path(&self) -> String {
        self.property().self_path()
    }
}

/// Live rotation of an external body.
#[derive(Clone, Debug, PartialEq)]
pub struct RotationValue {
    target: MechanismEntity,
}

impl RotationValue {
    pub fn new(target: MechanismEntity) -> Self {
        Self { target }
    }
}

impl ValueRef for RotationValue {
    fn property(&self) -> PropertyRef {
        PropertyRef::rotation(&self.target)
    }
}

/// Bounded persistent scalar stored on a host object.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarValue {
    owner: PropertyOwner,
    name: String,
    spec: ScalarSpec,
}

impl ScalarValue {
    pub fn new(owner: PropertyOwner, name: impl Into<String>, spec: ScalarSpec) -> Self {
        Self {
            owner,
            name: name.into(),
            spec,
        }
    }

    pub fn owner(&self) -> &PropertyOwner {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> ScalarSpec {
        self.spec
    }
}

impl ValueRef for ScalarValue {
    fn property(&self) -> PropertyRef {
        PropertyRef::scalar(self.owner.clone(), &self.name)
    }
}

/// Frames elapsed since the previous evaluation of the owning entity.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameDeltaValue(ScalarValue);

impl FrameDeltaValue {
    pub fn spec() -> ScalarSpec {
        ScalarSpec::unbounded(0.0)
    }

    pub fn new(entity: &EntityId) -> Self {
        Self(ScalarValue::new(
            PropertyOwner::Entity(entity.clone()),
            FRAME_DELTA_PROP,
            Self::spec(),
        ))
    }
}

impl ValueRef for FrameDeltaValue {
    fn property(&self) -> PropertyRef {
        self.0.property()
    }
}

/// Last frame number the owning entity was evaluated at.
#[derive(Clone, Debug, PartialEq)]
pub struct FramePrevValue(ScalarValue);

impl FramePrevValue {
    pub fn spec(current_frame: i64) -> ScalarSpec {
        ScalarSpec::unbounded(current_frame as f64)
    }

    pub fn new(entity: &EntityId, current_frame: i64) -> Self {
        Self(ScalarValue::new(
            PropertyOwner::Entity(entity.clone()),
            FRAME_PREV_PROP,
            Self::spec(current_frame),
        ))
    }
}

impl ValueRef for FramePrevValue {
    fn property(&self) -> PropertyRef {
        self.0.property()
    }
}

/// A node output scalar, optionally paired with a companion condition scalar
/// that downstream sinks may drive.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputValue {
    value: ScalarValue,
    condition: Option<ScalarValue>,
}

impl OutputValue {
    pub fn new(value: ScalarValue) -> Self {
        Self {
            value,
            condition: None,
        }
    }

    pub fn with_condition(value: ScalarValue, condition: ScalarValue) -> Self {
        Self {
            value,
            condition: Some(condition),
        }
    }

    pub fn value(&self) -> &ScalarValue {
        &self.value
    }

    pub fn condition(&self) -> Option<&ScalarValue> {
        self.condition.as_ref()
    }
}

impl ValueRef for OutputValue {
    fn property(&self) -> PropertyRef {
        self.value.property()
    }
}

/// Value passed along a link.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeValue {
    Rotation(RotationValue),
    Scalar(ScalarValue),
    Output(OutputValue),
}

impl NodeValue {
    /// Companion condition of an output value, if any.
    pub fn condition(&self) -> Option<&ScalarValue> {
        match self {
            NodeValue::Output(output) => output.condition(),
            _ => None,
        }
    }
}

impl ValueRef for NodeValue {
    fn property(&self) -> PropertyRef {
        match self {
            NodeValue::Rotation(v) => v.property(),
            NodeValue::Scalar(v) => v.property(),
            NodeValue::Output(v) => v.property(),
        }
    }
}

impl From<RotationValue> for NodeValue {
    fn from(value: RotationValue) -> Self {
        NodeValue::Rotation(value)
    }
}

impl From<ScalarValue> for NodeValue {
    fn from(value: ScalarValue) -> Self {
        NodeValue::Scalar(value)
    }
}

impl From<OutputValue> for NodeValue {
    fn from(value: OutputValue) -> Self {
        NodeValue::Output(value)
    }
}
