//! Handles to host-side objects. The compiler only ever references these; the
//! host owns the objects themselves.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A host entity (e.g. an armature object). Owns the per-entity frame timing
/// state and is the unit the compiler namespace is cleared on.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the three principal rotation axes.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A rotating body (e.g. a pose bone) inside a host entity.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle {
    pub entity: EntityId,
    pub name: String,
}

impl BodyHandle {
    pub fn new(entity: EntityId, name: &str) -> Self {
        Self {
            entity,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity, self.name)
    }
}

/// A rotating body together with the axis it turns around.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MechanismEntity {
    pub body: BodyHandle,
    pub axis: Axis,
}

impl MechanismEntity {
    pub fn new(entity: &EntityId, body: &str, axis: Axis) -> Self {
        Self {
            body: BodyHandle::new(entity.clone(), body),
            axis,
        }
    }

    pub fn entity(&self) -> &EntityId {
        &self.body.entity
    }
}

impl fmt::Display for MechanismEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.rotation_{}", self.body, self.axis)
    }
}

/// Where a stored scalar lives: on the entity itself or on one of its bodies.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyOwner {
    Entity(EntityId),
    Body(BodyHandle),
}

impl PropertyOwner {
    pub fn entity(&self) -> &EntityId {
        match self {
            PropertyOwner::Entity(id) => id,
            PropertyOwner::Body(body) => &body.entity,
        }
    }
}

impl fmt::Display for PropertyOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyOwner::Entity(id) => write!(f, "{}", id),
            PropertyOwner::Body(body) => write!(f, "{}", body),
        }
    }
}
