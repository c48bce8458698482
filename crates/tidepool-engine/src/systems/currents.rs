//! Ambient fluid currents.
//!
//! A cheap, fully deterministic drift field: the world is divided into
//! cells, each cell gets a stable direction from the world seed, and the
//! direction swings slowly over time so the water feels alive. Entities
//! without a physics body are drifted directly; bodied entities get an
//! impulse for the solver to integrate.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

use tidepool_entity::container::EntityContainer;
use tidepool_entity::math::Vec2;

use crate::systems::BodyCommand;

/// Side length of one current cell, world units.
const CELL_SIZE: f32 = 16.0;

/// How fast cell directions swing, radians per second.
const SWIRL_RATE: f32 = 0.2;

/// Deterministic ambient current field.
#[derive(Debug, Clone)]
pub struct CurrentsSystem {
    seed: u64,
    /// Drift speed in world units per second.
    pub strength: f32,
}

impl CurrentsSystem {
    /// A field derived from the world seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            strength: 0.4,
        }
    }

    /// Sample the current at a world position and simulation time.
    pub fn sample(&self, position: Vec2, time: f32) -> Vec2 {
        let cell_x = (position.x / CELL_SIZE).floor() as i64;
        let cell_y = (position.y / CELL_SIZE).floor() as i64;
        let cell_hash = (cell_x as u64)
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add((cell_y as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F));

        let mut rng = Pcg64Mcg::seed_from_u64(self.seed ^ cell_hash);
        let base_angle: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
        let phase: f32 = rng.gen_range(0.0..std::f32::consts::TAU);

        let angle = base_angle + (time * SWIRL_RATE + phase).sin() * 0.5;
        Vec2::new(angle.cos(), angle.sin()) * self.strength
    }

    /// Drift every live entity. Body-less entities move directly; bodied
    /// ones get an impulse command for the driver.
    pub fn update(
        &self,
        container: &mut EntityContainer,
        time: f32,
        delta: f32,
    ) -> Vec<BodyCommand> {
        let mut commands = Vec::new();
        for entity in container.live_mut() {
            let current = self.sample(entity.position, time);
            if entity.body.is_some() {
                commands.push(BodyCommand::Impulse(entity.id(), current * delta));
            } else {
                entity.position += current * delta;
            }
        }
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidepool_entity::components::{BodySpec, ShapeSpec};
    use tidepool_entity::entity::Entity;

    #[test]
    fn sampling_is_deterministic() {
        let a = CurrentsSystem::new(42);
        let b = CurrentsSystem::new(42);
        let position = Vec2::new(12.3, -45.6);
        assert_eq!(a.sample(position, 1.5), b.sample(position, 1.5));
    }

    #[test]
    fn different_seeds_give_different_fields() {
        let a = CurrentsSystem::new(1);
        let b = CurrentsSystem::new(2);
        let position = Vec2::new(3.0, 3.0);
        assert_ne!(a.sample(position, 0.0), b.sample(position, 0.0));
    }

    #[test]
    fn bodyless_entities_drift_in_place() {
        let currents = CurrentsSystem::new(7);
        let mut container = EntityContainer::new();
        let id = container.add(Entity::new(Vec2::ZERO)).unwrap();

        let commands = currents.update(&mut container, 0.0, 1.0);
        assert!(commands.is_empty());
        let moved = container.get(id).unwrap().position;
        assert!(moved.length() > 0.0, "entity should have drifted");
    }

    #[test]
    fn bodied_entities_get_impulses_instead() {
        let currents = CurrentsSystem::new(7);
        let mut container = EntityContainer::new();
        let id = container
            .add(
                Entity::new(Vec2::ZERO)
                    .with_body(BodySpec::moving(ShapeSpec::Ball { radius: 0.5 })),
            )
            .unwrap();

        let commands = currents.update(&mut container, 0.0, 1.0);
        assert_eq!(commands.len(), 1);
        assert!(matches!(commands[0], BodyCommand::Impulse(e, _) if e == id));
        // Position untouched; the solver owns bodied movement.
        assert_eq!(container.get(id).unwrap().position, Vec2::ZERO);
    }
}
