//! Logical-state snapshots with BLAKE3 integrity hashing.
//!
//! A [`SimulationSnapshot`] captures everything needed to reconstruct a
//! [`WorldSimulation`]'s logical state: the live entities (with their
//! component records), the id allocator, and the driver configuration.
//! Native physics handles are explicitly NOT serialized -- bodies are
//! recreated from each entity's [`BodySpec`] at its saved position and
//! rotation on restore. Velocities and contact state do not survive a
//! save/load cycle.
//!
//! Entities that are logically dead at capture time (a fading entity whose
//! alive marker is already false) are excluded: death is terminal and a
//! restored world should not resurrect them.
//!
//! The snapshot's BLAKE3 hex digest covers every serialized field; restore
//! recomputes and verifies it before touching any state.

use serde::{Deserialize, Serialize};

use tidepool_entity::container::EntityContainer;
use tidepool_entity::entity::Entity;
use tidepool_entity::id::EntityIdAllocator;
use tidepool_entity::math::Vec2;
use tidepool_physics::world::PhysicalWorld;

use crate::simulation::WorldSimulation;
use crate::SimulationError;

// ---------------------------------------------------------------------------
// SimulationSnapshot
// ---------------------------------------------------------------------------

/// Serializable logical state of a simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    /// Live (and alive) entities with their component records.
    pub entities: Vec<Entity>,
    /// Id allocator state, so restored ids stay unique.
    pub allocator: EntityIdAllocator,
    /// Minimum seconds between logic steps.
    pub minimum_step: f32,
    /// Physics catch-up bound.
    pub max_physics_catchup_steps: u32,
    /// World seed.
    pub seed: u64,
    /// Whether the agent phase runs.
    pub run_ai: bool,
    /// Player position at capture time.
    pub player_position: Vec2,
    /// Logic steps completed at capture time.
    pub step_count: u64,
    /// Simulation seconds stepped at capture time.
    pub elapsed: f32,
    /// BLAKE3 hex digest (64 lowercase hex chars) of every other field.
    pub hash: String,
}

/// Compute the digest over the hashable fields.
#[allow(clippy::too_many_arguments)]
fn compute_hash(
    entities: &[Entity],
    allocator: &EntityIdAllocator,
    minimum_step: f32,
    max_physics_catchup_steps: u32,
    seed: u64,
    run_ai: bool,
    player_position: Vec2,
    step_count: u64,
    elapsed: f32,
) -> String {
    #[derive(Serialize)]
    struct HashableState<'a> {
        entities: &'a [Entity],
        allocator: &'a EntityIdAllocator,
        minimum_step: f32,
        max_physics_catchup_steps: u32,
        seed: u64,
        run_ai: bool,
        player_position: Vec2,
        step_count: u64,
        elapsed: f32,
    }

    let bytes = serde_json::to_vec(&HashableState {
        entities,
        allocator,
        minimum_step,
        max_physics_catchup_steps,
        seed,
        run_ai,
        player_position,
        step_count,
        elapsed,
    })
    .expect("logical simulation state is always JSON-serializable");

    blake3::hash(&bytes).to_hex().to_string()
}

// ---------------------------------------------------------------------------
// Capture / restore
// ---------------------------------------------------------------------------

impl WorldSimulation {
    /// Capture the current logical state.
    pub fn capture_snapshot(&self) -> SimulationSnapshot {
        let entities: Vec<Entity> = self
            .container
            .live()
            .iter()
            .filter(|e| e.is_alive())
            .map(Entity::detached_clone)
            .collect();
        let allocator = self.container.allocator().clone();

        let hash = compute_hash(
            &entities,
            &allocator,
            self.minimum_step,
            self.max_physics_catchup_steps,
            self.seed,
            self.run_ai,
            self.player_position,
            self.step_count,
            self.elapsed,
        );

        SimulationSnapshot {
            entities,
            allocator,
            minimum_step: self.minimum_step,
            max_physics_catchup_steps: self.max_physics_catchup_steps,
            seed: self.seed,
            run_ai: self.run_ai,
            player_position: self.player_position,
            step_count: self.step_count,
            elapsed: self.elapsed,
            hash,
        }
    }

    /// Restore from a snapshot, replacing all current state.
    ///
    /// The digest is verified first; a mismatch leaves the simulation
    /// untouched. Physics bodies are recreated from each entity's
    /// [`BodySpec`](tidepool_entity::components::BodySpec) at its saved
    /// transform.
    pub fn restore_from_snapshot(
        &mut self,
        snapshot: &SimulationSnapshot,
    ) -> Result<(), SimulationError> {
        let computed = compute_hash(
            &snapshot.entities,
            &snapshot.allocator,
            snapshot.minimum_step,
            snapshot.max_physics_catchup_steps,
            snapshot.seed,
            snapshot.run_ai,
            snapshot.player_position,
            snapshot.step_count,
            snapshot.elapsed,
        );
        if computed != snapshot.hash {
            return Err(SimulationError::SnapshotDigestMismatch {
                expected: snapshot.hash.clone(),
                computed,
            });
        }

        // Tear down current physics state wholesale; wrappers drain into a
        // closed release channel, which is the intended teardown path.
        self.bodies.clear();
        self.physics = PhysicalWorld::new();

        self.container = EntityContainer::restore(
            snapshot.entities.iter().map(Entity::detached_clone).collect(),
            snapshot.allocator.clone(),
        );

        self.minimum_step = snapshot.minimum_step;
        self.max_physics_catchup_steps = snapshot.max_physics_catchup_steps;
        self.seed = snapshot.seed;
        self.run_ai = snapshot.run_ai;
        self.player_position = snapshot.player_position;
        self.step_count = snapshot.step_count;
        self.elapsed = snapshot.elapsed;

        // Rebuild native bodies from logical descriptions.
        let specs: Vec<_> = self
            .container
            .live()
            .iter()
            .filter_map(|e| e.body.map(|spec| (e.id(), spec, e.position, e.rotation)))
            .collect();
        for (id, spec, position, rotation) in specs {
            self.create_body_for(id, spec, position, rotation)?;
        }

        self.physics.notify_camera_position(self.player_position)?;
        Ok(())
    }

    /// Serialize a snapshot to JSON bytes.
    pub fn snapshot_to_bytes(snapshot: &SimulationSnapshot) -> Result<Vec<u8>, SimulationError> {
        Ok(serde_json::to_vec(snapshot)?)
    }

    /// Decode a snapshot from JSON bytes. The digest is verified on
    /// [`restore_from_snapshot`](Self::restore_from_snapshot), not here.
    pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<SimulationSnapshot, SimulationError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
