//! Timed-life expiry.
//!
//! Sweeps every entity carrying a timed-life record once per logic step.
//! A running fade is handled before the main countdown, matching the state
//! machine: `Active(ttl)` -> expiry -> either `Destroyed` outright or
//! `Fading(fade)` -> `Destroyed`. An entity that begins fading is marked
//! dead immediately -- it no longer counts as alive (and is excluded from
//! persistence) even though its removal from the container waits for the
//! fade to run out.

use tidepool_entity::container::{EntityContainer, LifecycleEvent};
use tidepool_entity::id::EntityId;

/// Advance all timed-life countdowns by one step.
pub fn update(container: &mut EntityContainer, delta: f32) {
    let mut to_destroy: Vec<EntityId> = Vec::new();
    let mut time_over: Vec<EntityId> = Vec::new();

    for entity in container.live_mut() {
        let id = entity.id();
        let alive = entity.alive_marker().clone();
        let Some(timed) = entity.timed_life.as_mut() else {
            continue;
        };

        if timed.is_fading() {
            if timed.tick_fade(delta) {
                to_destroy.push(id);
            }
            continue;
        }

        timed.time_to_live -= delta;
        if timed.time_to_live <= 0.0 {
            time_over.push(id);

            if timed.begin_fade() {
                // Logically dead right away so the entity is excluded from
                // saves; the record lingers until the fade completes.
                alive.mark_dead();
            } else {
                to_destroy.push(id);
            }
        }
    }

    for id in time_over {
        container.emit(LifecycleEvent::TimeOver(id));
    }
    for id in to_destroy {
        container.queue_destroy(id);
    }
}

/// Queue-destroy every entity that has a timed-life record.
pub fn despawn_all_timed(container: &mut EntityContainer) {
    let timed: Vec<EntityId> = container
        .live()
        .iter()
        .filter(|e| e.timed_life.is_some())
        .map(|e| e.id())
        .collect();
    for id in timed {
        container.queue_destroy(id);
    }
}
