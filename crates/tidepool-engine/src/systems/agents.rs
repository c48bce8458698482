//! Two-phase parallel agent processing.
//!
//! Phase A partitions the live agents into fixed-size chunks and hands each
//! chunk to the shared worker pool. A task only reads the [`SenseSnapshot`]
//! and writes to its own chunk's records -- no shared mutation, so the phase
//! is race-free by construction. The call blocks until every task has
//! joined; this is a hard barrier, not fire-and-forget.
//!
//! Phase B then walks the same entities on the calling thread, applying the
//! plans computed in Phase A: direct position integration for body-less
//! agents and [`BodyCommand`]s for bodied ones. Everything that can touch
//! cross-entity state lives here.
//!
//! A panic inside a Phase A task is caught at entity granularity, reported
//! as an [`AgentFault`] after the join, and excludes only that entity from
//! Phase B. One broken agent never takes the step down with it, and the
//! worker pool stays healthy for the next step.

use std::panic::{catch_unwind, AssertUnwindSafe};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use rayon::prelude::*;
use tracing::warn;

use tidepool_entity::components::AgentPlan;
use tidepool_entity::container::EntityContainer;
use tidepool_entity::entity::Entity;
use tidepool_entity::id::EntityId;
use tidepool_entity::math::Vec2;

use crate::systems::BodyCommand;

/// Entities per Phase A task. Small enough to spread across cores with a
/// few hundred agents, large enough that task overhead stays negligible.
pub const AGENTS_PER_TASK: usize = 64;

/// Neighbours closer than this make an agent swim away.
const CROWD_DISTANCE: f32 = 4.0;

/// A captured Phase A panic.
#[derive(Debug, Clone)]
pub struct AgentFault {
    /// The entity whose processing panicked.
    pub entity: EntityId,
    /// Panic payload, best effort.
    pub message: String,
}

/// The per-entity decision function run in Phase A. Receives exclusive
/// access to the entity plus the shared read-only snapshot.
pub type ThinkFn = fn(&mut Entity, &SenseSnapshot, f32);

// ---------------------------------------------------------------------------
// SenseSnapshot
// ---------------------------------------------------------------------------

/// Read-only facts captured before Phase A starts. Tasks share this by
/// reference; nothing in it can change while they run.
#[derive(Debug, Clone)]
pub struct SenseSnapshot {
    /// World seed, mixed into every agent's decision stream.
    pub seed: u64,
    /// Logic steps completed before this one.
    pub step: u64,
    /// Positions of all live entities, in arena order.
    pub positions: Vec<(EntityId, Vec2)>,
}

impl SenseSnapshot {
    /// Capture the snapshot for one step.
    pub fn capture(container: &EntityContainer, seed: u64, step: u64) -> Self {
        Self {
            seed,
            step,
            positions: container
                .live()
                .iter()
                .map(|e| (e.id(), e.position))
                .collect(),
        }
    }

    /// Nearest other entity to `position`, if any.
    pub fn nearest_other(&self, own: EntityId, position: Vec2) -> Option<(EntityId, Vec2)> {
        self.positions
            .iter()
            .filter(|(id, _)| *id != own)
            .min_by(|(_, a), (_, b)| {
                position
                    .distance(*a)
                    .partial_cmp(&position.distance(*b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .copied()
    }
}

// ---------------------------------------------------------------------------
// Phase A + B driver
// ---------------------------------------------------------------------------

/// Run both phases with the default decision function.
pub fn update(
    container: &mut EntityContainer,
    snapshot: &SenseSnapshot,
    delta: f32,
) -> (Vec<BodyCommand>, Vec<AgentFault>) {
    update_with(container, snapshot, delta, think)
}

/// Run both phases with a caller-supplied decision function.
pub fn update_with(
    container: &mut EntityContainer,
    snapshot: &SenseSnapshot,
    delta: f32,
    think_fn: ThinkFn,
) -> (Vec<BodyCommand>, Vec<AgentFault>) {
    // Phase A: parallel, unordered, read-mostly. Each chunk owns its
    // entities exclusively; the snapshot is the only shared input.
    let mut agents: Vec<&mut Entity> = container
        .live_mut()
        .iter_mut()
        .filter(|e| e.is_alive() && e.agent.is_some())
        .collect();

    let faults: Vec<AgentFault> = agents
        .par_chunks_mut(AGENTS_PER_TASK)
        .map(|chunk| {
            let mut chunk_faults = Vec::new();
            for entity in chunk.iter_mut() {
                let entity: &mut Entity = entity;
                let id = entity.id();
                let result = catch_unwind(AssertUnwindSafe(|| {
                    think_fn(entity, snapshot, delta);
                }));
                if let Err(payload) = result {
                    chunk_faults.push(AgentFault {
                        entity: id,
                        message: panic_message(payload.as_ref()),
                    });
                }
            }
            chunk_faults
        })
        .reduce(Vec::new, |mut all, mut chunk| {
            all.append(&mut chunk);
            all
        });
    // All tasks have joined here; Phase B below is the only writer again.

    for fault in &faults {
        warn!(entity = %fault.entity, message = %fault.message, "agent processing panicked");
    }
    let faulted: Vec<EntityId> = faults.iter().map(|f| f.entity).collect();

    // Phase B: sequential, in arena order, free to touch shared state.
    let mut commands = Vec::new();
    for entity in container.live_mut() {
        if !entity.is_alive() || faulted.contains(&entity.id()) {
            continue;
        }
        let Some(agent) = entity.agent.as_ref() else {
            continue;
        };
        let Some(plan) = agent.plan else {
            continue;
        };

        entity.rotation = plan.target_rotation;
        if entity.body.is_some() {
            commands.push(BodyCommand::SetVelocity(entity.id(), plan.target_velocity));
        } else {
            entity.position += plan.target_velocity * delta;
        }
    }

    (commands, faults)
}

/// Default decision logic: re-decide on the agent's own cadence, wandering
/// with a deterministic per-entity jitter and shying away from the nearest
/// crowding neighbour.
pub fn think(entity: &mut Entity, snapshot: &SenseSnapshot, delta: f32) {
    let id = entity.id();
    let position = entity.position;
    let Some(agent) = entity.agent.as_mut() else {
        return;
    };

    agent.since_decision += delta;
    if agent.since_decision < agent.decision_interval && agent.plan.is_some() {
        return;
    }
    agent.since_decision = 0.0;

    // Seeded per (world, entity, step): identical decisions for any chunk
    // layout and any worker count.
    let mut rng = Pcg64Mcg::seed_from_u64(
        snapshot
            .seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(id.to_raw())
            .wrapping_add(snapshot.step.wrapping_mul(0xC2B2_AE3D_27D4_EB4F)),
    );

    let mut heading: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
    if let Some((_, neighbour)) = snapshot.nearest_other(id, position) {
        if position.distance(neighbour) < CROWD_DISTANCE {
            let away = (position - neighbour).normalized_or_zero();
            if away != Vec2::ZERO {
                heading = away.y.atan2(away.x);
            }
        }
    }

    agent.plan = Some(AgentPlan {
        target_velocity: Vec2::new(heading.cos(), heading.sin()) * agent.cruise_speed,
        target_rotation: heading,
    });
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "agent panicked with a non-string payload".to_owned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tidepool_entity::components::Agent;

    fn agent_entity(position: Vec2) -> Entity {
        Entity::new(position).with_agent(Agent::new(0.5, 2.0))
    }

    fn populated(count: usize) -> EntityContainer {
        let mut container = EntityContainer::new();
        for i in 0..count {
            container
                .add(agent_entity(Vec2::new(i as f32 * 10.0, 0.0)))
                .unwrap();
        }
        container
    }

    #[test]
    fn phase_a_results_are_visible_in_phase_b() {
        let mut container = populated(5);
        let snapshot = SenseSnapshot::capture(&container, 1, 0);
        let (_, faults) = update(&mut container, &snapshot, 0.1);
        assert!(faults.is_empty());

        for entity in container.live() {
            let agent = entity.agent.as_ref().unwrap();
            let plan = agent.plan.expect("every agent decided in phase A");
            // Phase B applied the plan to the entity.
            assert_eq!(entity.rotation, plan.target_rotation);
            assert!(entity.position != Vec2::new(entity.id().index() as f32 * 10.0, 0.0));
        }
    }

    #[test]
    fn results_identical_for_any_worker_count() {
        fn run(threads: usize) -> Vec<(EntityId, Vec2, f32)> {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap();
            pool.install(|| {
                let mut container = populated(150);
                for step in 0..10u64 {
                    let snapshot = SenseSnapshot::capture(&container, 99, step);
                    let (_, faults) = update(&mut container, &snapshot, 0.1);
                    assert!(faults.is_empty());
                }
                container
                    .live()
                    .iter()
                    .map(|e| (e.id(), e.position, e.rotation))
                    .collect()
            })
        }

        let serial = run(1);
        let parallel = run(8);
        assert_eq!(serial, parallel);
    }

    #[test]
    fn panicking_agent_is_isolated_and_reported() {
        fn explosive(entity: &mut Entity, snapshot: &SenseSnapshot, delta: f32) {
            if entity.id().index() == 1 {
                panic!("this agent is broken");
            }
            think(entity, snapshot, delta);
        }

        let mut container = populated(3);
        let victim = container.live()[1].id();
        let snapshot = SenseSnapshot::capture(&container, 1, 0);

        let (_, faults) = update_with(&mut container, &snapshot, 0.1, explosive);
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].entity, victim);
        assert!(faults[0].message.contains("broken"));

        // The other agents still processed normally.
        let planned = container
            .live()
            .iter()
            .filter(|e| e.agent.as_ref().unwrap().plan.is_some())
            .count();
        assert_eq!(planned, 2);

        // And the pool is healthy: a second step with the default logic
        // processes everyone, including the previously faulted entity.
        let snapshot = SenseSnapshot::capture(&container, 1, 1);
        let (_, faults) = update(&mut container, &snapshot, 0.5);
        assert!(faults.is_empty());
    }

    #[test]
    fn one_task_per_entity_degenerate_chunking() {
        // More agents than one chunk holds exercises multi-task dispatch;
        // the barrier still sees every plan before phase B runs.
        let mut container = populated(AGENTS_PER_TASK * 3 + 7);
        let snapshot = SenseSnapshot::capture(&container, 5, 0);
        let (_, faults) = update(&mut container, &snapshot, 0.1);
        assert!(faults.is_empty());
        assert!(container
            .live()
            .iter()
            .all(|e| e.agent.as_ref().unwrap().plan.is_some()));
    }

    #[test]
    fn dead_agents_are_skipped() {
        let mut container = populated(2);
        let dead = container.live()[0].id();
        container.get(dead).unwrap().alive_marker().mark_dead();

        let snapshot = SenseSnapshot::capture(&container, 1, 0);
        update(&mut container, &snapshot, 0.1);

        assert!(container
            .get(dead)
            .unwrap()
            .agent
            .as_ref()
            .unwrap()
            .plan
            .is_none());
    }

    #[test]
    fn crowded_agents_swim_apart() {
        let mut container = EntityContainer::new();
        let a = container.add(agent_entity(Vec2::new(0.0, 0.0))).unwrap();
        let b = container.add(agent_entity(Vec2::new(1.0, 0.0))).unwrap();

        let snapshot = SenseSnapshot::capture(&container, 1, 0);
        update(&mut container, &snapshot, 0.1);

        let pos_a = container.get(a).unwrap().position;
        let pos_b = container.get(b).unwrap().position;
        assert!(
            pos_b.x - pos_a.x > 1.0,
            "agents should separate, got {} and {}",
            pos_a.x,
            pos_b.x
        );
    }
}
