//! Per-entity frame timing state.
//!
//! `frame_delta` must read the previous frame number without binding
//! `frame_prev`, or the host would see `frame_delta -> frame_prev -> frame_delta`
//! and reject the graph. It reads `frame_prev` through self-access instead.
//! `frame_prev` binds `frame_delta` without reading it, so the host commits the
//! new frame number only after the delta has been computed.

use log::debug;

use crate::error::CompileError;
use crate::model::entity::{EntityId, PropertyOwner};
use crate::model::value::{
    FRAME_DELTA_PROP, FRAME_PREV_PROP, FrameDeltaValue, FramePrevValue, ValueRef,
};

use super::emit::{Emitter, RuleBuilder};

pub fn install(
    emitter: &mut Emitter<'_>,
    entity: &EntityId,
    current_frame: i64,
) -> Result<FrameDeltaValue, CompileError> {
    let owner = PropertyOwner::Entity(entity.clone());
    let delta = FrameDeltaValue::new(entity);
    let prev = FramePrevValue::new(entity, current_frame);

    emitter.scalar(owner.clone(), FRAME_DELTA_PROP, FrameDeltaValue::spec())?;
    emitter.scalar(owner, FRAME_PREV_PROP, FramePrevValue::spec(current_frame))?;

    emitter.emit(
        RuleBuilder::new(&delta, "frame - {frame_prev}").self_value("frame_prev", &prev),
    )?;
    emitter.emit(RuleBuilder::new(&prev, "frame").depends_on("delta", &delta))?;

    debug!(
        "Frame timing on {} starts at frame {} ({})",
        entity,
        current_frame,
        prev.property()
    );
    Ok(delta)
}
