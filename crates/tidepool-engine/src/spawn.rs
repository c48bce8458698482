//! The spawn-policy boundary.
//!
//! What and where to spawn is gameplay's decision, not the kernel's. The
//! simulation calls the installed [`SpawnPolicy`] once per logic step with a
//! read-only [`SpawnView`]; the policy answers by queueing entities into
//! [`SpawnRequests`]. Requests are materialized at the start of the *next*
//! step -- never retroactively into the step that produced them -- so a
//! policy always sees a consistent population.

use tidepool_entity::entity::Entity;
use tidepool_entity::math::Vec2;

// ---------------------------------------------------------------------------
// SpawnView
// ---------------------------------------------------------------------------

/// What a spawn policy is allowed to see.
#[derive(Debug, Clone, Copy)]
pub struct SpawnView {
    /// Number of live entities.
    pub entity_count: usize,
    /// Sum of live entity weights. Policies should stop spawning past a
    /// budget to keep step times bounded.
    pub weighted_count: f32,
    /// Player position, the usual center of spawn activity.
    pub player_position: Vec2,
    /// Logic steps completed so far.
    pub step: u64,
}

// ---------------------------------------------------------------------------
// SpawnRequests
// ---------------------------------------------------------------------------

/// Collector for entities a policy wants spawned.
#[derive(Debug, Default)]
pub struct SpawnRequests {
    queued: Vec<Entity>,
}

impl SpawnRequests {
    /// Queue an entity for the next step.
    pub fn spawn(&mut self, entity: Entity) {
        self.queued.push(entity);
    }

    /// Number of queued requests.
    pub fn len(&self) -> usize {
        self.queued.len()
    }

    /// Whether nothing was requested.
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    pub(crate) fn drain(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.queued)
    }
}

// ---------------------------------------------------------------------------
// SpawnPolicy
// ---------------------------------------------------------------------------

/// External provider of spawn/despawn decisions.
pub trait SpawnPolicy: Send {
    /// Called once per logic step, after the other systems have run.
    fn update(&mut self, view: &SpawnView, requests: &mut SpawnRequests, delta: f32);
}

/// Policy that never spawns anything. Installed by default so a simulation
/// is usable without gameplay attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSpawnPolicy;

impl SpawnPolicy for NullSpawnPolicy {
    fn update(&mut self, _view: &SpawnView, _requests: &mut SpawnRequests, _delta: f32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_collect_and_drain() {
        let mut requests = SpawnRequests::default();
        assert!(requests.is_empty());
        requests.spawn(Entity::new(Vec2::ZERO));
        requests.spawn(Entity::new(Vec2::new(1.0, 1.0)));
        assert_eq!(requests.len(), 2);

        let drained = requests.drain();
        assert_eq!(drained.len(), 2);
        assert!(requests.is_empty());
    }

    #[test]
    fn null_policy_requests_nothing() {
        let mut policy = NullSpawnPolicy;
        let mut requests = SpawnRequests::default();
        policy.update(
            &SpawnView {
                entity_count: 0,
                weighted_count: 0.0,
                player_position: Vec2::ZERO,
                step: 0,
            },
            &mut requests,
            1.0 / 60.0,
        );
        assert!(requests.is_empty());
    }
}
