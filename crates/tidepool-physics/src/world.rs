//! Owning wrapper for the physics world.
//!
//! A [`PhysicalWorld`] exclusively owns one engine-side world and all of its
//! simulation state. The wrapper is move-only and never cloned; release is
//! explicit and terminal, after which every operation fails with
//! [`PhysicsError::DisposedHandle`]. Dropping an unreleased world performs
//! the same cleanup, so the engine state is freed on every exit path.

use tracing::debug;

use tidepool_entity::collision::{CollisionFilter, CollisionRecord};
use tidepool_entity::components::BodyKind;
use tidepool_entity::id::EntityId;
use tidepool_entity::math::Vec2;

use crate::body::PhysicsBody;
use crate::debug_draw::{DebugDrawLevel, DebugDrawSink};
use crate::native::{NativeWorld, RawBodyHandle};
use crate::shape::PhysicsShape;
use crate::PhysicsError;

/// Handle to one physics world.
pub struct PhysicalWorld {
    native: Option<NativeWorld>,
}

impl PhysicalWorld {
    /// Create a world with no bodies.
    pub fn new() -> Self {
        Self {
            native: Some(NativeWorld::new()),
        }
    }

    /// Release the engine-side world. Terminal; all bodies created by this
    /// world die with it. Dropping the wrapper without calling this performs
    /// the same cleanup.
    pub fn release(&mut self) -> Result<(), PhysicsError> {
        match self.native.take() {
            Some(_) => Ok(()),
            None => Err(PhysicsError::DisposedHandle("physics world")),
        }
    }

    fn native(&self) -> Result<&NativeWorld, PhysicsError> {
        self.native
            .as_ref()
            .ok_or(PhysicsError::DisposedHandle("physics world"))
    }

    fn native_mut(&mut self) -> Result<&mut NativeWorld, PhysicsError> {
        self.native
            .as_mut()
            .ok_or(PhysicsError::DisposedHandle("physics world"))
    }

    // -- body lifecycle ------------------------------------------------------

    /// Create a moving body.
    pub fn create_moving_body(
        &mut self,
        shape: &PhysicsShape,
        position: Vec2,
        rotation: f32,
        entity: EntityId,
        add_to_world: bool,
    ) -> Result<PhysicsBody, PhysicsError> {
        let native_shape = shape.access()?.clone();
        let native = self.native_mut()?;
        let handle = native.create_body(
            &native_shape,
            BodyKind::Moving,
            position,
            rotation,
            entity,
            add_to_world,
        );
        Ok(PhysicsBody::new(handle, native.release_sender()))
    }

    /// Create a static body.
    pub fn create_static_body(
        &mut self,
        shape: &PhysicsShape,
        position: Vec2,
        rotation: f32,
        entity: EntityId,
        add_to_world: bool,
    ) -> Result<PhysicsBody, PhysicsError> {
        let native_shape = shape.access()?.clone();
        let native = self.native_mut()?;
        let handle = native.create_body(
            &native_shape,
            BodyKind::Fixed,
            position,
            rotation,
            entity,
            add_to_world,
        );
        Ok(PhysicsBody::new(handle, native.release_sender()))
    }

    /// Add a body created with `add_to_world = false` to the world.
    /// Idempotent: adding an already-added body only logs.
    pub fn add_body(&mut self, body: &PhysicsBody, activate: bool) -> Result<(), PhysicsError> {
        let handle = body.handle()?;
        match self.native_mut()?.add_body(handle, activate) {
            Some(true) => Ok(()),
            Some(false) => {
                debug!(body = handle.to_raw(), "body was already in the world");
                Ok(())
            }
            None => Err(PhysicsError::UnknownBody),
        }
    }

    /// Remove a body from the simulation, dropping the world's reference to
    /// it. The wrapper's own reference stays valid for reads until released.
    pub fn destroy_body(&mut self, body: &PhysicsBody) -> Result<(), PhysicsError> {
        let handle = body.handle()?;
        match self.native_mut()?.remove_body_from_world(handle) {
            Some(true) => Ok(()),
            Some(false) => Err(PhysicsError::BodyNotInWorld),
            None => Err(PhysicsError::UnknownBody),
        }
    }

    /// Release a body wrapper's engine reference, consuming the wrapper.
    /// This is the deterministic disposal path.
    pub fn release_body(&mut self, mut body: PhysicsBody) -> Result<(), PhysicsError> {
        let handle = body.take_for_release()?;
        self.native_mut()?.release_ref(handle);
        Ok(())
    }

    /// Duplicate a body handle with an explicit reference-count increment.
    pub fn clone_body_ref(&mut self, body: &PhysicsBody) -> Result<PhysicsBody, PhysicsError> {
        let handle = body.handle()?;
        let native = self.native_mut()?;
        if !native.add_ref(handle) {
            return Err(PhysicsError::UnknownBody);
        }
        Ok(PhysicsBody::new(handle, native.release_sender()))
    }

    /// Number of live bodies (in-world or not).
    pub fn body_count(&self) -> Result<usize, PhysicsError> {
        Ok(self.native()?.body_count())
    }

    // -- body state ----------------------------------------------------------

    /// Read a body's position and rotation.
    pub fn read_body_transform(&self, body: &PhysicsBody) -> Result<(Vec2, f32), PhysicsError> {
        let handle = body.handle()?;
        self.native()?
            .read_transform(handle)
            .ok_or(PhysicsError::UnknownBody)
    }

    /// Drive a body at the given velocity.
    pub fn set_body_velocity(
        &mut self,
        body: &PhysicsBody,
        velocity: Vec2,
    ) -> Result<(), PhysicsError> {
        let handle = body.handle()?;
        if self.native_mut()?.set_velocity(handle, velocity) {
            Ok(())
        } else {
            Err(PhysicsError::UnknownBody)
        }
    }

    /// Apply an instantaneous impulse to a body.
    pub fn apply_body_impulse(
        &mut self,
        body: &PhysicsBody,
        impulse: Vec2,
    ) -> Result<(), PhysicsError> {
        let handle = body.handle()?;
        if self.native_mut()?.apply_impulse(handle, impulse) {
            Ok(())
        } else {
            Err(PhysicsError::UnknownBody)
        }
    }

    /// Teleport a body to a position and rotation.
    pub fn set_body_transform(
        &mut self,
        body: &PhysicsBody,
        position: Vec2,
        rotation: f32,
    ) -> Result<(), PhysicsError> {
        let handle = body.handle()?;
        if self.native_mut()?.set_transform(handle, position, rotation) {
            Ok(())
        } else {
            Err(PhysicsError::UnknownBody)
        }
    }

    /// Keep the solver from spinning a body.
    pub fn lock_body_rotation(&mut self, body: &PhysicsBody) -> Result<(), PhysicsError> {
        let handle = body.handle()?;
        if self.native_mut()?.lock_rotation(handle) {
            Ok(())
        } else {
            Err(PhysicsError::UnknownBody)
        }
    }

    // -- collision configuration ---------------------------------------------

    /// Enable collision recording for a body. Increase-only.
    pub fn start_body_collision_recording(
        &mut self,
        body: &PhysicsBody,
        max_records: u32,
    ) -> Result<(), PhysicsError> {
        let handle = body.handle()?;
        if self.native_mut()?.set_recording(handle, max_records) {
            Ok(())
        } else {
            Err(PhysicsError::UnknownBody)
        }
    }

    /// Records captured for a body during the most recent step. Valid until
    /// the next step overwrites them.
    pub fn recorded_collisions(
        &self,
        body: &PhysicsBody,
    ) -> Result<&[CollisionRecord], PhysicsError> {
        let handle = body.handle()?;
        let native = self.native()?;
        if !native.is_live(handle) {
            return Err(PhysicsError::UnknownBody);
        }
        Ok(native.recorded(handle))
    }

    /// Replace a body's collision ignore list.
    pub fn set_body_collision_ignores(
        &mut self,
        body: &PhysicsBody,
        ignored: Vec<RawBodyHandle>,
    ) -> Result<(), PhysicsError> {
        let handle = body.handle()?;
        if self.native_mut()?.set_ignores(handle, ignored) {
            Ok(())
        } else {
            Err(PhysicsError::UnknownBody)
        }
    }

    /// Install or clear a body's contact filter.
    pub fn set_body_collision_filter(
        &mut self,
        body: &PhysicsBody,
        filter: Option<CollisionFilter>,
    ) -> Result<(), PhysicsError> {
        let handle = body.handle()?;
        if self.native_mut()?.set_filter(handle, filter) {
            Ok(())
        } else {
            Err(PhysicsError::UnknownBody)
        }
    }

    // -- stepping ------------------------------------------------------------

    /// Advance the simulation by `delta` seconds of wall time. The engine
    /// rate-limits internally; the return value says whether any fixed
    /// sub-step actually ran.
    pub fn step(&mut self, delta: f32) -> Result<bool, PhysicsError> {
        Ok(self.native_mut()?.step(delta))
    }

    /// Fixed frames of debt the engine has not yet simulated. Worked off by
    /// calling [`step`](Self::step) with a zero delta.
    pub fn steps_behind(&self) -> Result<u32, PhysicsError> {
        Ok(self.native()?.steps_behind())
    }

    /// Wall-clock seconds the latest stepped call spent simulating.
    pub fn latest_step_seconds(&self) -> Result<f32, PhysicsError> {
        Ok(self.native()?.latest_step_seconds())
    }

    /// Rolling average of step durations.
    pub fn average_step_seconds(&self) -> Result<f32, PhysicsError> {
        Ok(self.native()?.average_step_seconds())
    }

    // -- debug introspection --------------------------------------------------

    /// Install a debug draw sink. Level zero removes any installed sink.
    pub fn set_debug_draw(
        &mut self,
        level: DebugDrawLevel,
        sink: Option<Box<dyn DebugDrawSink>>,
    ) -> Result<(), PhysicsError> {
        self.native_mut()?.set_debug_draw(level, sink);
        Ok(())
    }

    /// Report the camera position for debug draw culling.
    pub fn notify_camera_position(&mut self, position: Vec2) -> Result<(), PhysicsError> {
        self.native_mut()?.set_camera_position(position);
        Ok(())
    }
}

impl Default for PhysicalWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PhysicalWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalWorld")
            .field("released", &self.native.is_none())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NATIVE_PHYSICS_FRAME_RATE;

    const FRAME: f32 = 1.0 / NATIVE_PHYSICS_FRAME_RATE;

    fn world_with_body() -> (PhysicalWorld, PhysicsBody) {
        let mut world = PhysicalWorld::new();
        let shape = PhysicsShape::ball(0.5);
        let body = world
            .create_moving_body(&shape, Vec2::ZERO, 0.0, EntityId::UNSET, true)
            .unwrap();
        (world, body)
    }

    #[test]
    fn released_world_rejects_everything() {
        let (mut world, body) = world_with_body();
        world.release().unwrap();

        assert!(matches!(
            world.step(FRAME),
            Err(PhysicsError::DisposedHandle("physics world"))
        ));
        assert!(matches!(
            world.read_body_transform(&body),
            Err(PhysicsError::DisposedHandle("physics world"))
        ));
        assert!(matches!(
            world.body_count(),
            Err(PhysicsError::DisposedHandle("physics world"))
        ));
        assert!(matches!(
            world.release(),
            Err(PhysicsError::DisposedHandle("physics world"))
        ));
    }

    #[test]
    fn world_outlives_released_bodies() {
        let (mut world, body) = world_with_body();
        world.destroy_body(&body).unwrap();
        world.release_body(body).unwrap();

        // A fresh body proves the world itself is fine.
        let shape = PhysicsShape::ball(0.5);
        let other = world
            .create_moving_body(&shape, Vec2::ZERO, 0.0, EntityId::UNSET, true)
            .unwrap();
        assert!(world.read_body_transform(&other).is_ok());
    }

    #[test]
    fn body_ops_after_dispose_fail_with_disposed_handle() {
        let (mut world, mut body) = world_with_body();
        body.take_for_release().unwrap();

        assert!(matches!(
            world.read_body_transform(&body),
            Err(PhysicsError::DisposedHandle("physics body"))
        ));
        assert!(matches!(
            world.set_body_velocity(&body, Vec2::new(1.0, 0.0)),
            Err(PhysicsError::DisposedHandle("physics body"))
        ));
        assert!(matches!(
            world.destroy_body(&body),
            Err(PhysicsError::DisposedHandle("physics body"))
        ));
        assert!(matches!(
            world.release_body(body),
            Err(PhysicsError::DisposedHandle("physics body"))
        ));
    }

    #[test]
    fn destroy_twice_reports_not_in_world() {
        let (mut world, body) = world_with_body();
        world.destroy_body(&body).unwrap();
        assert!(matches!(
            world.destroy_body(&body),
            Err(PhysicsError::BodyNotInWorld)
        ));
        world.release_body(body).unwrap();
        assert_eq!(world.body_count().unwrap(), 0);
    }

    #[test]
    fn dropped_wrapper_is_reclaimed_on_next_step() {
        let (mut world, body) = world_with_body();
        world.destroy_body(&body).unwrap();
        drop(body);

        assert_eq!(world.body_count().unwrap(), 1, "slot alive until drained");
        world.step(FRAME).unwrap();
        assert_eq!(world.body_count().unwrap(), 0);
    }

    #[test]
    fn clone_body_ref_keeps_slot_alive() {
        let (mut world, body) = world_with_body();
        let copy = world.clone_body_ref(&body).unwrap();

        world.destroy_body(&body).unwrap();
        world.release_body(body).unwrap();
        // The explicit duplicate still holds a reference.
        assert_eq!(world.body_count().unwrap(), 1);
        assert!(world.read_body_transform(&copy).is_ok());

        world.release_body(copy).unwrap();
        assert_eq!(world.body_count().unwrap(), 0);
    }

    #[test]
    fn deferred_body_is_invisible_until_added() {
        let mut world = PhysicalWorld::new();
        let shape = PhysicsShape::ball(0.5);
        let body = world
            .create_moving_body(&shape, Vec2::ZERO, 0.0, EntityId::UNSET, false)
            .unwrap();

        world.set_body_velocity(&body, Vec2::new(10.0, 0.0)).unwrap();
        for _ in 0..10 {
            world.step(FRAME).unwrap();
        }
        let (pos, _) = world.read_body_transform(&body).unwrap();
        assert!(pos.x.abs() < 1e-3, "disabled body must not move");

        world.add_body(&body, true).unwrap();
        world.set_body_velocity(&body, Vec2::new(10.0, 0.0)).unwrap();
        for _ in 0..10 {
            world.step(FRAME).unwrap();
        }
        let (pos, _) = world.read_body_transform(&body).unwrap();
        assert!(pos.x > 0.5, "added body should move, x={}", pos.x);
    }

    #[test]
    fn step_reports_whether_it_ran() {
        let mut world = PhysicalWorld::new();
        assert!(!world.step(FRAME * 0.25).unwrap());
        assert!(!world.step(FRAME * 0.25).unwrap());
        assert!(world.step(FRAME * 0.5).unwrap());
    }
}
