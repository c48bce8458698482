//! Collision-state synchronization.
//!
//! Entities mutate their [`CollisionManagement`] settings freely during a
//! step; nothing takes effect until this pass pushes the logical state to
//! the engine side and flips `state_applied` back to true. After the physics
//! step, the companion pass copies what the engine recorded into each
//! entity's fixed-capacity buffer, where gameplay reads it until the next
//! step overwrites it.

use std::collections::BTreeMap;

use tidepool_entity::container::EntityContainer;
use tidepool_entity::id::EntityId;
use tidepool_physics::body::PhysicsBody;
use tidepool_physics::native::RawBodyHandle;
use tidepool_physics::world::PhysicalWorld;
use tidepool_physics::PhysicsError;

/// Push every out-of-date collision configuration to the engine side.
pub fn apply_pending_state(
    container: &mut EntityContainer,
    physics: &mut PhysicalWorld,
    bodies: &BTreeMap<EntityId, PhysicsBody>,
) -> Result<(), PhysicsError> {
    // Resolve ignore lists before borrowing entities mutably.
    let mut resolved_ignores: BTreeMap<EntityId, Vec<RawBodyHandle>> = BTreeMap::new();
    for entity in container.live() {
        let Some(cm) = entity.collisions.as_ref() else {
            continue;
        };
        if cm.is_state_applied() {
            continue;
        }
        let handles = cm
            .ignored()
            .iter()
            .filter_map(|other| bodies.get(other))
            .filter_map(|body| body.handle().ok())
            .collect();
        resolved_ignores.insert(entity.id(), handles);
    }

    for entity in container.live_mut() {
        let id = entity.id();
        let Some(cm) = entity.collisions.as_mut() else {
            continue;
        };
        if cm.is_state_applied() {
            continue;
        }

        if let Some(body) = bodies.get(&id) {
            if cm.record_limit() > 0 {
                physics.start_body_collision_recording(body, cm.record_limit())?;
            }
            let ignores = resolved_ignores.remove(&id).unwrap_or_default();
            physics.set_body_collision_ignores(body, ignores)?;
            physics.set_body_collision_filter(body, cm.filter().cloned())?;
        }
        cm.mark_state_applied();
    }
    Ok(())
}

/// Copy the engine's per-body records from the step that just completed
/// into each recording entity's buffer.
pub fn publish_records(
    container: &mut EntityContainer,
    physics: &PhysicalWorld,
    bodies: &BTreeMap<EntityId, PhysicsBody>,
) -> Result<(), PhysicsError> {
    for entity in container.live_mut() {
        let id = entity.id();
        let Some(cm) = entity.collisions.as_mut() else {
            continue;
        };
        if cm.record_limit() == 0 {
            continue;
        }
        match bodies.get(&id) {
            Some(body) => {
                let records = physics.recorded_collisions(body)?.to_vec();
                cm.write_records(records);
            }
            None => cm.write_records(std::iter::empty()),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tidepool_entity::collision::CollisionManagement;
    use tidepool_entity::components::{BodySpec, ShapeSpec};
    use tidepool_entity::entity::Entity;
    use tidepool_entity::math::Vec2;
    use tidepool_physics::native::NATIVE_PHYSICS_FRAME_RATE;
    use tidepool_physics::shape::PhysicsShape;

    const FRAME: f32 = 1.0 / NATIVE_PHYSICS_FRAME_RATE;

    struct Rig {
        container: EntityContainer,
        physics: PhysicalWorld,
        bodies: BTreeMap<EntityId, PhysicsBody>,
    }

    fn rig_with_pair() -> (Rig, EntityId, EntityId) {
        let mut container = EntityContainer::new();
        let mut physics = PhysicalWorld::new();
        let mut bodies = BTreeMap::new();

        let spec = BodySpec::moving(ShapeSpec::Ball { radius: 0.5 });
        let shape = PhysicsShape::ball(0.5);

        let mover = container
            .add(
                Entity::new(Vec2::ZERO)
                    .with_body(spec)
                    .with_collisions(CollisionManagement::new()),
            )
            .unwrap();
        let target = container
            .add(Entity::new(Vec2::new(1.5, 0.0)).with_body(spec))
            .unwrap();

        for &(id, position) in &[(mover, Vec2::ZERO), (target, Vec2::new(1.5, 0.0))] {
            let body = physics
                .create_moving_body(&shape, position, 0.0, id, true)
                .unwrap();
            bodies.insert(id, body);
        }

        (
            Rig {
                container,
                physics,
                bodies,
            },
            mover,
            target,
        )
    }

    fn drive_until_contact(rig: &mut Rig, mover: EntityId) -> bool {
        rig.physics
            .set_body_velocity(&rig.bodies[&mover], Vec2::new(10.0, 0.0))
            .unwrap();
        for _ in 0..120 {
            rig.physics.step(FRAME).unwrap();
            publish_records(&mut rig.container, &rig.physics, &rig.bodies).unwrap();
            let cm = rig.container.get(mover).unwrap().collisions.as_ref().unwrap();
            if !cm.active_collisions().is_empty() {
                return true;
            }
        }
        false
    }

    #[test]
    fn apply_marks_state_and_enables_recording() {
        let (mut rig, mover, target) = rig_with_pair();
        {
            let cm = rig
                .container
                .get_mut(mover)
                .unwrap()
                .collisions
                .as_mut()
                .unwrap();
            cm.start_recording(4);
            assert!(!cm.is_state_applied());
        }

        apply_pending_state(&mut rig.container, &mut rig.physics, &rig.bodies).unwrap();
        assert!(rig
            .container
            .get(mover)
            .unwrap()
            .collisions
            .as_ref()
            .unwrap()
            .is_state_applied());

        assert!(drive_until_contact(&mut rig, mover));
        let cm = rig.container.get(mover).unwrap().collisions.as_ref().unwrap();
        let record = cm.active_collisions()[0];
        assert_eq!(record.first_entity, mover);
        assert_eq!(record.second_entity, target);
    }

    #[test]
    fn ignored_entities_produce_no_records() {
        let (mut rig, mover, target) = rig_with_pair();
        {
            let cm = rig
                .container
                .get_mut(mover)
                .unwrap()
                .collisions
                .as_mut()
                .unwrap();
            cm.start_recording(4);
            cm.ignore_collisions_with(target);
        }

        apply_pending_state(&mut rig.container, &mut rig.physics, &rig.bodies).unwrap();
        assert!(!drive_until_contact(&mut rig, mover));
    }

    #[test]
    fn bodyless_entities_are_marked_applied_without_engine_calls() {
        let mut container = EntityContainer::new();
        let mut physics = PhysicalWorld::new();
        let bodies = BTreeMap::new();

        let id = container
            .add(Entity::new(Vec2::ZERO).with_collisions(CollisionManagement::new()))
            .unwrap();
        container
            .get_mut(id)
            .unwrap()
            .collisions
            .as_mut()
            .unwrap()
            .start_recording(2);

        apply_pending_state(&mut container, &mut physics, &bodies).unwrap();
        assert!(container
            .get(id)
            .unwrap()
            .collisions
            .as_ref()
            .unwrap()
            .is_state_applied());
    }
}
