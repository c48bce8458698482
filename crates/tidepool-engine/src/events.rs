//! Step-scoped event stream.
//!
//! The simulation collects these while a logic step runs; callers drain them
//! with [`WorldSimulation::take_events`](crate::simulation::WorldSimulation::take_events)
//! between steps. Events are the kernel's outward notification channel --
//! gameplay reacts to them instead of registering callbacks on entities.

use tidepool_entity::container::LifecycleEvent;
use tidepool_entity::id::EntityId;

/// Something observable that happened during a logic step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldEvent {
    /// An entity joined the simulation.
    EntityAdded(EntityId),
    /// An entity's destruction completed. Emitted exactly once per entity.
    EntityDestroyed(EntityId),
    /// A timed-life countdown expired this step.
    EntityTimeOver(EntityId),
    /// An agent's parallel-phase processing panicked. The entity was skipped
    /// for the rest of the step; the step itself continued.
    AgentFaulted {
        /// The entity whose processing failed.
        entity: EntityId,
        /// Panic payload, best effort.
        message: String,
    },
}

impl From<LifecycleEvent> for WorldEvent {
    fn from(event: LifecycleEvent) -> Self {
        match event {
            LifecycleEvent::AddedToWorld(id) => WorldEvent::EntityAdded(id),
            LifecycleEvent::Destroyed(id) => WorldEvent::EntityDestroyed(id),
            LifecycleEvent::TimeOver(id) => WorldEvent::EntityTimeOver(id),
        }
    }
}
