pub mod entity;
pub mod graph;
pub mod rule;
pub mod value;

pub use entity::{Axis, BodyHandle, EntityId, MechanismEntity, PropertyOwner};
pub use graph::{InputSlot, Link, MechanismGraph, Node, NodeId, NodeKind, OutputSlot};
pub use rule::{Binding, Rule};
pub use value::{
    FrameDeltaValue, FramePrevValue, NodeValue, OutputValue, PropertyRef, RotationValue,
    ScalarSpec, ScalarValue, ValueRef,
};
