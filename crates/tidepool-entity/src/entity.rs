//! The entity record.
//!
//! An [`Entity`] is a stable identifier, a world-space position, a shared
//! alive marker, an optional set of named groups, and a sparse set of typed
//! component records. There is no behaviour here; systems act on entities by
//! checking which records are present.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::alive::{AliveMarker, AliveWatch};
use crate::collision::CollisionManagement;
use crate::components::{Agent, BodySpec, Compounds, Processor, TimedLife};
use crate::id::EntityId;
use crate::math::Vec2;

/// One simulated entity.
///
/// Construct with [`Entity::new`] and the `with_*` builders, then hand to
/// [`EntityContainer::add`](crate::container::EntityContainer::add), which
/// assigns the id. Component records are plain public fields; systems take
/// what they need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    /// World-space position.
    pub position: Vec2,
    /// Facing angle, radians.
    pub rotation: f32,
    /// Simulation heaviness used when budgeting spawns. Plain entities
    /// weigh 1.
    pub weight: f32,
    alive: AliveMarker,
    groups: BTreeSet<String>,
    /// Countdown-driven despawning.
    pub timed_life: Option<TimedLife>,
    /// Collision recording, ignores and filtering.
    pub collisions: Option<CollisionManagement>,
    /// Compound storage.
    pub compounds: Option<Compounds>,
    /// Compound conversions run each step.
    pub processor: Option<Processor>,
    /// Autonomous behaviour.
    pub agent: Option<Agent>,
    /// Logical physics body description; the simulation creates and owns the
    /// actual body handle.
    pub body: Option<BodySpec>,
}

impl Entity {
    /// A fresh, alive entity at `position` with no components.
    pub fn new(position: Vec2) -> Self {
        Self {
            id: EntityId::UNSET,
            position,
            rotation: 0.0,
            weight: 1.0,
            alive: AliveMarker::new(),
            groups: BTreeSet::new(),
            timed_life: None,
            collisions: None,
            compounds: None,
            processor: None,
            agent: None,
            body: None,
        }
    }

    // -- builders -----------------------------------------------------------

    /// Add a named group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    /// Set the simulation weight.
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    /// Attach a timed-life record.
    pub fn with_timed_life(mut self, timed: TimedLife) -> Self {
        self.timed_life = Some(timed);
        self
    }

    /// Attach collision management.
    pub fn with_collisions(mut self, collisions: CollisionManagement) -> Self {
        self.collisions = Some(collisions);
        self
    }

    /// Attach compound storage.
    pub fn with_compounds(mut self, compounds: Compounds) -> Self {
        self.compounds = Some(compounds);
        self
    }

    /// Attach a compound processor.
    pub fn with_processor(mut self, processor: Processor) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Attach agent behaviour.
    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Attach a physics body description.
    pub fn with_body(mut self, body: BodySpec) -> Self {
        self.body = Some(body);
        self
    }

    // -- identity and liveness ----------------------------------------------

    /// The container-assigned id. [`EntityId::UNSET`] until added.
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub(crate) fn assign_id(&mut self, id: EntityId) {
        self.id = id;
    }

    /// Whether the entity is still alive.
    pub fn is_alive(&self) -> bool {
        self.alive.is_alive()
    }

    /// The alive marker, for subsystems that flip liveness.
    pub fn alive_marker(&self) -> &AliveMarker {
        &self.alive
    }

    /// A read-only liveness handle safe to hold without keeping the entity
    /// or its container reachable.
    pub fn watch_alive(&self) -> AliveWatch {
        self.alive.watch()
    }

    /// Clone with a detached alive marker seeded from the current liveness.
    ///
    /// A plain clone shares the marker, which is wrong for saved state: a
    /// snapshot copy must not observe deaths that happen after the capture.
    pub fn detached_clone(&self) -> Entity {
        let mut copy = self.clone();
        copy.alive = self.alive.detached();
        copy
    }

    // -- groups --------------------------------------------------------------

    /// Whether the entity belongs to `group`.
    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    /// Add a named group after construction. Returns `false` when already a
    /// member.
    pub fn add_group(&mut self, group: impl Into<String>) -> bool {
        self.groups.insert(group.into())
    }

    /// Remove a named group. Returns `false` when not a member.
    pub fn remove_group(&mut self, group: &str) -> bool {
        self.groups.remove(group)
    }

    /// Group names in sorted order.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entity_is_alive_and_unset() {
        let e = Entity::new(Vec2::new(1.0, 2.0));
        assert!(e.is_alive());
        assert_eq!(e.id(), EntityId::UNSET);
        assert_eq!(e.weight, 1.0);
    }

    #[test]
    fn groups_are_sorted_and_deduplicated() {
        let mut e = Entity::new(Vec2::ZERO)
            .with_group("chunks")
            .with_group("agents");
        assert!(e.add_group("zeta"));
        assert!(!e.add_group("chunks"));
        let names: Vec<&str> = e.groups().collect();
        assert_eq!(names, vec!["agents", "chunks", "zeta"]);
        assert!(e.remove_group("zeta"));
        assert!(!e.remove_group("zeta"));
    }

    #[test]
    fn watch_survives_clone_independent_flags() {
        let e = Entity::new(Vec2::ZERO);
        let watch = e.watch_alive();
        e.alive_marker().mark_dead();
        assert!(!watch.is_alive());
    }
}
