//! The authoritative registry of live entities.
//!
//! The container keeps two arenas: the *live* arena that systems iterate and
//! a *pending* arena for entities queued for destruction. Destruction moves
//! the record between arenas instead of flagging it in place, so live-arena
//! iteration stays dense and never has to skip tombstones. The pending arena
//! is drained at one fixed point in the logic step by the simulation driver.
//!
//! Lifecycle transitions emit [`LifecycleEvent`]s instead of invoking
//! callbacks on the entity; gameplay observes the event stream.

use tracing::warn;

use crate::entity::Entity;
use crate::id::{EntityId, EntityIdAllocator};
use crate::EntityError;

// ---------------------------------------------------------------------------
// LifecycleEvent
// ---------------------------------------------------------------------------

/// Entity lifecycle notifications, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The entity was added to the container.
    AddedToWorld(EntityId),
    /// The entity's destruction completed (pending arena drained or bulk
    /// clear). Emitted exactly once per entity.
    Destroyed(EntityId),
    /// A timed-life countdown expired this step.
    TimeOver(EntityId),
}

// ---------------------------------------------------------------------------
// EntityContainer
// ---------------------------------------------------------------------------

/// Two-arena entity registry with deferred destruction.
#[derive(Debug, Default)]
pub struct EntityContainer {
    live: Vec<Entity>,
    pending: Vec<Entity>,
    allocator: EntityIdAllocator,
    events: Vec<LifecycleEvent>,
}

impl EntityContainer {
    /// An empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a container from previously captured state. Entities keep
    /// their saved ids; the allocator must be the one captured alongside
    /// them so no id is ever handed out twice.
    pub fn restore(entities: Vec<Entity>, allocator: EntityIdAllocator) -> Self {
        Self {
            live: entities,
            pending: Vec::new(),
            allocator,
            events: Vec::new(),
        }
    }

    // -- lifecycle ----------------------------------------------------------

    /// Add an entity, assigning it an id.
    ///
    /// Fails with [`EntityError::NotAlive`] when the entity's alive marker is
    /// already false -- a dead record must never re-enter a simulation.
    pub fn add(&mut self, mut entity: Entity) -> Result<EntityId, EntityError> {
        if !entity.is_alive() {
            return Err(EntityError::NotAlive);
        }
        let id = self.allocator.allocate();
        entity.assign_id(id);
        self.live.push(entity);
        self.events.push(LifecycleEvent::AddedToWorld(id));
        Ok(id)
    }

    /// Queue an entity for destruction.
    ///
    /// Returns `true` when the entity is now (or was already) queued,
    /// `false` when it is not in this container at all. Idempotent: queuing
    /// an already-queued entity has no further effect.
    pub fn queue_destroy(&mut self, id: EntityId) -> bool {
        if let Some(pos) = self.live.iter().position(|e| e.id() == id) {
            let entity = self.live.remove(pos);
            self.pending.push(entity);
            return true;
        }
        if self.pending.iter().any(|e| e.id() == id) {
            return true;
        }
        warn!(entity = %id, "tried to destroy an entity that is not in this container");
        false
    }

    /// Complete every queued destruction: mark the entity dead, emit its
    /// `Destroyed` event, release its id, and hand the record back so the
    /// caller can free external resources (physics bodies and the like).
    pub fn drain_destroyed(&mut self) -> Vec<Entity> {
        let drained: Vec<Entity> = self.pending.drain(..).collect();
        for entity in &drained {
            entity.alive_marker().mark_dead();
            self.allocator.release(entity.id());
            self.events.push(LifecycleEvent::Destroyed(entity.id()));
        }
        drained
    }

    /// Destroy everything, optionally keeping one live entity.
    ///
    /// Queued destructions are completed first; an entity already queued is
    /// destroyed even when named as `skip`, since queuing already promised
    /// its destruction. A live `skip` survives untouched and remains in the
    /// container. Returns all destroyed records.
    pub fn clear_all(&mut self, skip: Option<EntityId>) -> Vec<Entity> {
        let mut destroyed = self.drain_destroyed();

        let mut kept = Vec::new();
        for entity in self.live.drain(..) {
            if Some(entity.id()) == skip {
                kept.push(entity);
                continue;
            }
            entity.alive_marker().mark_dead();
            self.allocator.release(entity.id());
            self.events.push(LifecycleEvent::Destroyed(entity.id()));
            destroyed.push(entity);
        }
        self.live = kept;
        destroyed
    }

    // -- queries ------------------------------------------------------------

    /// Whether `id` is live in this container (queued entities no longer
    /// count as being in the world).
    pub fn is_in_world(&self, id: EntityId) -> bool {
        self.live.iter().any(|e| e.id() == id)
    }

    /// Whether `id` is queued for destruction.
    pub fn is_queued_for_destruction(&self, id: EntityId) -> bool {
        self.pending.iter().any(|e| e.id() == id)
    }

    /// Shared access to a live entity.
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.live.iter().find(|e| e.id() == id)
    }

    /// Mutable access to a live entity.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.live.iter_mut().find(|e| e.id() == id)
    }

    /// The live arena, in insertion order.
    pub fn live(&self) -> &[Entity] {
        &self.live
    }

    /// Mutable view of the live arena.
    pub fn live_mut(&mut self) -> &mut [Entity] {
        &mut self.live
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether the live arena is empty.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Sum of live entity weights, used to budget spawning.
    pub fn weighted_count(&self) -> f32 {
        self.live.iter().map(|e| e.weight).sum()
    }

    /// Lazily filter the live arena by group membership. Restartable; the
    /// borrow keeps the arena structurally frozen while any iterator is
    /// alive.
    pub fn with_group<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a Entity> + 'a {
        self.live.iter().filter(move |e| e.has_group(group))
    }

    // -- events --------------------------------------------------------------

    /// Append a lifecycle event. Used by systems that detect transitions the
    /// container itself cannot see (timed-life expiry).
    pub fn emit(&mut self, event: LifecycleEvent) {
        self.events.push(event);
    }

    /// Take all events emitted since the previous call.
    pub fn take_events(&mut self) -> Vec<LifecycleEvent> {
        std::mem::take(&mut self.events)
    }

    /// Consume the container, yielding the live entities and the allocator
    /// for snapshotting.
    pub fn into_parts(self) -> (Vec<Entity>, EntityIdAllocator) {
        (self.live, self.allocator)
    }

    /// The allocator, for snapshotting without consuming the container.
    pub fn allocator(&self) -> &EntityIdAllocator {
        &self.allocator
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;

    fn spawn(container: &mut EntityContainer) -> EntityId {
        container.add(Entity::new(Vec2::ZERO)).unwrap()
    }

    #[test]
    fn add_assigns_id_and_emits_event() {
        let mut container = EntityContainer::new();
        let id = spawn(&mut container);
        assert_ne!(id, EntityId::UNSET);
        assert!(container.is_in_world(id));
        assert_eq!(
            container.take_events(),
            vec![LifecycleEvent::AddedToWorld(id)]
        );
    }

    #[test]
    fn add_rejects_dead_entity() {
        let mut container = EntityContainer::new();
        let entity = Entity::new(Vec2::ZERO);
        entity.alive_marker().mark_dead();
        assert!(matches!(container.add(entity), Err(EntityError::NotAlive)));
        assert!(container.is_empty());
    }

    #[test]
    fn queue_destroy_moves_between_arenas() {
        let mut container = EntityContainer::new();
        let id = spawn(&mut container);

        assert!(container.queue_destroy(id));
        assert!(!container.is_in_world(id));
        assert!(container.is_queued_for_destruction(id));
    }

    #[test]
    fn never_in_both_arenas() {
        let mut container = EntityContainer::new();
        let a = spawn(&mut container);
        let b = spawn(&mut container);
        container.queue_destroy(a);

        for id in [a, b] {
            assert!(!(container.is_in_world(id) && container.is_queued_for_destruction(id)));
        }
    }

    #[test]
    fn queue_destroy_is_idempotent() {
        let mut container = EntityContainer::new();
        let id = spawn(&mut container);
        container.take_events();

        assert!(container.queue_destroy(id));
        assert!(container.queue_destroy(id));

        let drained = container.drain_destroyed();
        assert_eq!(drained.len(), 1);

        // Exactly one Destroyed event despite the double queue.
        let destroyed: Vec<_> = container
            .take_events()
            .into_iter()
            .filter(|e| matches!(e, LifecycleEvent::Destroyed(_)))
            .collect();
        assert_eq!(destroyed, vec![LifecycleEvent::Destroyed(id)]);
    }

    #[test]
    fn queue_destroy_unknown_returns_false() {
        let mut container = EntityContainer::new();
        assert!(!container.queue_destroy(EntityId::new(9, 9)));
    }

    #[test]
    fn drain_marks_dead_and_returns_records() {
        let mut container = EntityContainer::new();
        let id = spawn(&mut container);
        let watch = container.get(id).unwrap().watch_alive();

        container.queue_destroy(id);
        assert!(watch.is_alive(), "queued but not yet destroyed");

        let drained = container.drain_destroyed();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].id(), id);
        assert!(!watch.is_alive());
        assert!(!container.is_queued_for_destruction(id));
    }

    #[test]
    fn destroyed_id_is_recycled_with_new_generation() {
        let mut container = EntityContainer::new();
        let first = spawn(&mut container);
        container.queue_destroy(first);
        container.drain_destroyed();

        let second = spawn(&mut container);
        assert_eq!(second.index(), first.index());
        assert_ne!(second, first);
        assert!(!container.is_in_world(first));
        assert!(container.is_in_world(second));
    }

    #[test]
    fn clear_all_honors_skip() {
        let mut container = EntityContainer::new();
        let keep = spawn(&mut container);
        let drop1 = spawn(&mut container);
        let drop2 = spawn(&mut container);

        let destroyed = container.clear_all(Some(keep));
        let destroyed_ids: Vec<EntityId> = destroyed.iter().map(|e| e.id()).collect();
        assert_eq!(destroyed_ids, vec![drop1, drop2]);
        assert!(container.is_in_world(keep));
        assert!(container.get(keep).unwrap().is_alive());
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn clear_all_destroys_queued_skip() {
        let mut container = EntityContainer::new();
        let doomed = spawn(&mut container);
        container.queue_destroy(doomed);

        // Naming a queued entity as skip does not rescind its destruction.
        let destroyed = container.clear_all(Some(doomed));
        assert_eq!(destroyed.len(), 1);
        assert_eq!(destroyed[0].id(), doomed);
        assert!(container.is_empty());
    }

    #[test]
    fn clear_all_without_skip_empties_everything() {
        let mut container = EntityContainer::new();
        let a = spawn(&mut container);
        spawn(&mut container);
        container.queue_destroy(a);
        container.take_events();

        let destroyed = container.clear_all(None);
        assert_eq!(destroyed.len(), 2);
        assert!(container.is_empty());

        let events = container.take_events();
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, LifecycleEvent::Destroyed(_)))
                .count(),
            2
        );
    }

    #[test]
    fn with_group_filters_lazily() {
        let mut container = EntityContainer::new();
        container
            .add(Entity::new(Vec2::ZERO).with_group("chunk"))
            .unwrap();
        let agent = container
            .add(Entity::new(Vec2::ZERO).with_group("agent"))
            .unwrap();
        container
            .add(Entity::new(Vec2::ZERO).with_group("agent"))
            .unwrap();

        assert_eq!(container.with_group("agent").count(), 2);
        assert_eq!(container.with_group("chunk").count(), 1);
        assert_eq!(container.with_group("missing").count(), 0);

        // Restartable: a second pass sees the same entities.
        let first: Vec<EntityId> = container.with_group("agent").map(|e| e.id()).collect();
        let second: Vec<EntityId> = container.with_group("agent").map(|e| e.id()).collect();
        assert_eq!(first, second);
        assert!(first.contains(&agent));
    }

    #[test]
    fn weighted_count_sums_weights() {
        let mut container = EntityContainer::new();
        container
            .add(Entity::new(Vec2::ZERO).with_weight(2.5))
            .unwrap();
        container.add(Entity::new(Vec2::ZERO)).unwrap();
        assert!((container.weighted_count() - 3.5).abs() < f32::EPSILON);
    }
}
