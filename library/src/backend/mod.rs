//! Host adapter interface.
//!
//! The compiler talks to the animation host only through [`Backend`]. Every call
//! carries the compiler namespace so state created by one compiler can be
//! cleared without touching anything else on the entity.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BackendError;
use crate::model::entity::{EntityId, MechanismEntity, PropertyOwner};
use crate::model::rule::Rule;
use crate::model::value::{PropertyRef, ScalarSpec};

#[cfg(feature = "memory-backend")]
pub mod memory;

pub const DEFAULT_NAMESPACE: &str = "__gearsim__";

/// Tag on every piece of host state created by a compiler.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Host handle of an installed expression.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExpressionId(pub Uuid);

impl ExpressionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExpressionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExpressionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub trait Backend {
    /// Longest expression string the host accepts.
    fn max_expression_length(&self) -> usize;

    /// Creates a bounded persistent scalar. Calling it again for an existing
    /// property keeps the stored value.
    fn create_scalar(
        &mut self,
        namespace: &Namespace,
        owner: &PropertyOwner,
        name: &str,
        spec: ScalarSpec,
    ) -> Result<PropertyRef, BackendError>;

    fn create_rotation_ref(
        &mut self,
        namespace: &Namespace,
        entity: &MechanismEntity,
    ) -> Result<PropertyRef, BackendError>;

    fn create_expression(
        &mut self,
        namespace: &Namespace,
        rule: &Rule,
    ) -> Result<ExpressionId, BackendError>;

    /// Removes every scalar and expression `namespace` created on `entity` and
    /// its bodies.
    fn clear_namespace(&mut self, namespace: &Namespace, entity: &EntityId)
    -> Result<(), BackendError>;
}
