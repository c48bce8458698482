//! Per-step simulation systems.
//!
//! Each system is a plain function (or small struct) over the entity
//! container; the driver calls them in a fixed order every logic step.
//! Systems never touch the physics bridge directly -- anything that must
//! reach a body is returned as a [`BodyCommand`] for the driver to apply,
//! keeping the bridge exclusively owned by the simulation thread.

pub mod agents;
pub mod collision_sync;
pub mod currents;
pub mod processes;
pub mod timed_life;

use tidepool_entity::id::EntityId;
use tidepool_entity::math::Vec2;

/// A deferred mutation of a physics body, produced by a system and applied
/// by the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyCommand {
    /// Drive the entity's body at a velocity.
    SetVelocity(EntityId, Vec2),
    /// Apply an instantaneous impulse to the entity's body.
    Impulse(EntityId, Vec2),
}
