//! The world simulation driver.
//!
//! [`WorldSimulation`] owns the entity container, the physics world, and the
//! per-step systems, and decouples variable-rate frames from fixed-rate
//! logic with a time accumulator. One logic step is:
//!
//! 1. Accumulate the caller's delta; stop if below the minimum step size.
//! 2. Reconcile physics: work off any fixed-frame debt with bounded
//!    catch-up steps.
//! 3. Materialize spawns queued during the previous step.
//! 4. Fixed logic in a deterministic order: transform read-back, ambient
//!    currents, compound processing, timed-life expiry, agents (skippable),
//!    spawn policy, collision-state synchronization.
//! 5. Drain the deferred-destroy queue, releasing physics bodies.
//! 6. Step the physics world exactly once, sized to the accumulated time.
//! 7. Publish collision records and reset the accumulator.
//!
//! An entity destroyed during step 4 therefore always completes its
//! destruction -- event emitted, body released -- before step 6 reads any
//! body transform again.

use std::collections::BTreeMap;

use tracing::warn;

use tidepool_entity::components::{BodyKind, BodySpec};
use tidepool_entity::container::EntityContainer;
use tidepool_entity::entity::Entity;
use tidepool_entity::id::EntityId;
use tidepool_entity::math::Vec2;
use tidepool_physics::body::PhysicsBody;
use tidepool_physics::debug_draw::{DebugDrawLevel, DebugDrawSink};
use tidepool_physics::shape::PhysicsShape;
use tidepool_physics::world::PhysicalWorld;
use tidepool_physics::PhysicsError;

use crate::events::WorldEvent;
use crate::spawn::{NullSpawnPolicy, SpawnPolicy, SpawnRequests, SpawnView};
use crate::systems::agents::{self, SenseSnapshot};
use crate::systems::currents::CurrentsSystem;
use crate::systems::{collision_sync, processes, timed_life, BodyCommand};
use crate::SimulationError;

// ---------------------------------------------------------------------------
// SimulationConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`WorldSimulation`].
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Minimum seconds between logic steps. Defaults to one sixtieth.
    pub minimum_step: f32,
    /// Upper bound on physics catch-up steps per logic step. Past this the
    /// remaining debt carries over instead of stalling the step. Must be at
    /// least 1.
    pub max_physics_catchup_steps: u32,
    /// Seed for everything random: currents, agent decisions.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            minimum_step: 1.0 / 60.0,
            max_physics_catchup_steps: 8,
            seed: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// WorldSimulation
// ---------------------------------------------------------------------------

/// A running entity simulation with external physics.
pub struct WorldSimulation {
    pub(crate) container: EntityContainer,
    pub(crate) physics: PhysicalWorld,
    /// Bodies owned by this simulation, keyed by entity. Sorted map so
    /// iteration (transform sync, release) is deterministic.
    pub(crate) bodies: BTreeMap<EntityId, PhysicsBody>,
    currents: CurrentsSystem,
    spawn_policy: Box<dyn SpawnPolicy>,
    pending_spawns: Vec<Entity>,
    events: Vec<WorldEvent>,

    accumulated: f32,
    pub(crate) minimum_step: f32,
    pub(crate) max_physics_catchup_steps: u32,
    pub(crate) seed: u64,
    pub(crate) run_ai: bool,
    pub(crate) player_position: Vec2,
    pub(crate) step_count: u64,
    pub(crate) elapsed: f32,
    initialized: bool,
}

impl WorldSimulation {
    /// Build a simulation from configuration. [`initialize`](Self::initialize)
    /// must be called before any stepping.
    ///
    /// # Panics
    ///
    /// Panics if `minimum_step` is not positive and finite or
    /// `max_physics_catchup_steps` is zero; both are construction-time
    /// programming errors.
    pub fn new(config: SimulationConfig) -> Self {
        assert!(
            config.minimum_step > 0.0 && config.minimum_step.is_finite(),
            "minimum_step must be positive and finite, got {}",
            config.minimum_step
        );
        assert!(
            config.max_physics_catchup_steps >= 1,
            "max_physics_catchup_steps must be at least 1"
        );
        Self {
            container: EntityContainer::new(),
            physics: PhysicalWorld::new(),
            bodies: BTreeMap::new(),
            currents: CurrentsSystem::new(config.seed),
            spawn_policy: Box::new(NullSpawnPolicy),
            pending_spawns: Vec::new(),
            events: Vec::new(),
            accumulated: 0.0,
            minimum_step: config.minimum_step,
            max_physics_catchup_steps: config.max_physics_catchup_steps,
            seed: config.seed,
            run_ai: true,
            player_position: Vec2::ZERO,
            step_count: 0,
            elapsed: 0.0,
            initialized: false,
        }
    }

    /// One-time initialization: verifies the native physics API version and
    /// arms the stepping entry points.
    pub fn initialize(&mut self) -> Result<(), SimulationError> {
        if self.initialized {
            return Err(SimulationError::AlreadyInitialized);
        }
        tidepool_physics::check_api_version()?;
        self.initialized = true;
        Ok(())
    }

    /// Whether initialization has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn ensure_initialized(&self) -> Result<(), SimulationError> {
        if self.initialized {
            Ok(())
        } else {
            Err(SimulationError::NotInitialized)
        }
    }

    // -- entity management ---------------------------------------------------

    /// Add an entity immediately, creating its physics body when it carries
    /// a [`BodySpec`]. Prefer [`queue_spawn`](Self::queue_spawn) from inside
    /// step-driven code.
    pub fn add_entity(&mut self, entity: Entity) -> Result<EntityId, SimulationError> {
        let body_spec = entity.body;
        let position = entity.position;
        let rotation = entity.rotation;
        let id = self.container.add(entity)?;
        if let Some(spec) = body_spec {
            self.create_body_for(id, spec, position, rotation)?;
        }
        Ok(id)
    }

    /// Queue an entity for addition at the start of the next logic step.
    /// Entities queued mid-step are never visible retroactively to the step
    /// in progress.
    pub fn queue_spawn(&mut self, entity: Entity) {
        self.pending_spawns.push(entity);
    }

    /// Queue an entity for destruction. Completion happens at the drain
    /// point of the current (or next) logic step. Idempotent; returns
    /// `false` only for entities this simulation does not contain.
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        self.container.queue_destroy(id)
    }

    /// Destroy every entity now, optionally keeping one, and release their
    /// physics bodies.
    pub fn destroy_all_entities(
        &mut self,
        skip: Option<EntityId>,
    ) -> Result<(), SimulationError> {
        let destroyed = self.container.clear_all(skip);
        self.release_bodies_for(&destroyed)
    }

    /// Whether the entity is live in this simulation (not queued for
    /// destruction).
    pub fn is_entity_in_world(&self, id: EntityId) -> bool {
        self.container.is_in_world(id)
    }

    /// Whether the entity is queued for destruction.
    pub fn is_queued_for_deletion(&self, id: EntityId) -> bool {
        self.container.is_queued_for_destruction(id)
    }

    /// Shared access to a live entity.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.container.get(id)
    }

    /// Mutable access to a live entity.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.container.get_mut(id)
    }

    /// All live entities.
    pub fn entities(&self) -> &[Entity] {
        self.container.live()
    }

    /// Live entities belonging to a named group.
    pub fn entities_with_group<'a>(
        &'a self,
        group: &'a str,
    ) -> impl Iterator<Item = &'a Entity> + 'a {
        self.container.with_group(group)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.container.len()
    }

    /// Sum of live entity weights, for spawn budgeting.
    pub fn weighted_entity_count(&self) -> f32 {
        self.container.weighted_count()
    }

    // -- configuration -------------------------------------------------------

    /// Cap the logic update rate. Also constrains how often the physics
    /// world is asked to step (its internal sub-stepping stays consistent).
    pub fn set_logic_max_update_rate(&mut self, logic_fps: f32) {
        assert!(logic_fps > 0.0, "logic_fps must be positive");
        self.minimum_step = 1.0 / logic_fps;
    }

    /// Enable or disable the agent phase. Checked once at the start of each
    /// step; this is a cheap skip, not a mid-step cancellation.
    pub fn set_run_ai(&mut self, run_ai: bool) {
        self.run_ai = run_ai;
    }

    /// Whether the agent phase runs.
    pub fn run_ai(&self) -> bool {
        self.run_ai
    }

    /// Install the spawn policy consulted each step.
    pub fn set_spawn_policy(&mut self, policy: Box<dyn SpawnPolicy>) {
        self.spawn_policy = policy;
    }

    /// Update the player position used for simulation accuracy decisions
    /// and debug-draw culling.
    pub fn set_player_position(&mut self, position: Vec2) -> Result<(), SimulationError> {
        self.player_position = position;
        self.physics.notify_camera_position(position)?;
        Ok(())
    }

    /// The player position last reported.
    pub fn player_position(&self) -> Vec2 {
        self.player_position
    }

    /// Install a physics debug draw sink.
    pub fn set_debug_draw(
        &mut self,
        level: DebugDrawLevel,
        sink: Option<Box<dyn DebugDrawSink>>,
    ) -> Result<(), SimulationError> {
        self.physics.set_debug_draw(level, sink)?;
        Ok(())
    }

    /// Read-only access to the physics world, for timing introspection.
    pub fn physics(&self) -> &PhysicalWorld {
        &self.physics
    }

    /// Logic steps completed so far.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Simulation seconds stepped so far.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Drain the events collected since the previous call.
    pub fn take_events(&mut self) -> Vec<WorldEvent> {
        self.collect_container_events();
        std::mem::take(&mut self.events)
    }

    // -- stepping ------------------------------------------------------------

    /// Per-frame logic. Purely cosmetic: returns the interpolation alpha
    /// (fraction of a logic step accumulated) for renderers to blend with.
    pub fn process_frame_logic(&mut self, _delta: f32) -> Result<f32, SimulationError> {
        self.ensure_initialized()?;
        Ok((self.accumulated / self.minimum_step).clamp(0.0, 1.0))
    }

    /// Advance simulation time. Runs one fixed logic step once enough time
    /// has accumulated; returns whether a step ran this call.
    pub fn process_logic(&mut self, delta: f32) -> Result<bool, SimulationError> {
        self.ensure_initialized()?;

        self.accumulated += delta;
        if self.accumulated < self.minimum_step {
            return Ok(false);
        }

        self.reconcile_physics()?;

        let step_delta = self.accumulated;
        self.flush_pending_spawns()?;
        self.run_fixed_logic(step_delta)?;
        self.drain_destroy_queue()?;

        self.physics.step(step_delta)?;
        collision_sync::publish_records(&mut self.container, &self.physics, &self.bodies)?;

        self.accumulated = 0.0;
        self.elapsed += step_delta;
        self.step_count += 1;
        self.collect_container_events();
        Ok(true)
    }

    /// Block on any previously started physics run and work off fixed-frame
    /// debt, bounded by the configured catch-up limit.
    fn reconcile_physics(&mut self) -> Result<(), SimulationError> {
        let mut catchup = 0;
        while self.physics.steps_behind()? > 0 && catchup < self.max_physics_catchup_steps {
            self.physics.step(0.0)?;
            catchup += 1;
        }
        let behind = self.physics.steps_behind()?;
        if behind > 0 {
            warn!(
                behind,
                limit = self.max_physics_catchup_steps,
                "physics still behind after bounded catch-up; debt carries over"
            );
        }
        Ok(())
    }

    fn flush_pending_spawns(&mut self) -> Result<(), SimulationError> {
        for entity in std::mem::take(&mut self.pending_spawns) {
            self.add_entity(entity)?;
        }
        Ok(())
    }

    fn run_fixed_logic(&mut self, delta: f32) -> Result<(), SimulationError> {
        self.sync_transforms_from_bodies()?;

        let commands = self.currents.update(&mut self.container, self.elapsed, delta);
        self.apply_body_commands(commands)?;

        processes::update(&mut self.container, delta);
        timed_life::update(&mut self.container, delta);

        if self.run_ai {
            let snapshot = SenseSnapshot::capture(&self.container, self.seed, self.step_count);
            let (commands, faults) = agents::update(&mut self.container, &snapshot, delta);
            self.apply_body_commands(commands)?;
            for fault in faults {
                self.events.push(WorldEvent::AgentFaulted {
                    entity: fault.entity,
                    message: fault.message,
                });
            }
        }

        self.run_spawn_policy(delta);
        collision_sync::apply_pending_state(&mut self.container, &mut self.physics, &self.bodies)?;
        Ok(())
    }

    fn run_spawn_policy(&mut self, delta: f32) {
        let view = SpawnView {
            entity_count: self.container.len(),
            weighted_count: self.container.weighted_count(),
            player_position: self.player_position,
            step: self.step_count,
        };
        let mut requests = SpawnRequests::default();
        self.spawn_policy.update(&view, &mut requests, delta);
        self.pending_spawns.extend(requests.drain());
    }

    fn drain_destroy_queue(&mut self) -> Result<(), SimulationError> {
        let destroyed = self.container.drain_destroyed();
        self.release_bodies_for(&destroyed)
    }

    fn sync_transforms_from_bodies(&mut self) -> Result<(), SimulationError> {
        for (id, body) in &self.bodies {
            if let Some(entity) = self.container.get_mut(*id) {
                let (position, rotation) = self.physics.read_body_transform(body)?;
                entity.position = position;
                entity.rotation = rotation;
            }
        }
        Ok(())
    }

    /// Drive an entity's body at a velocity (player control and scripted
    /// movement). Returns `false` when the entity has no body.
    pub fn set_entity_velocity(
        &mut self,
        id: EntityId,
        velocity: Vec2,
    ) -> Result<bool, SimulationError> {
        match self.bodies.get(&id) {
            Some(body) => {
                self.physics.set_body_velocity(body, velocity)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Apply an instantaneous impulse to an entity's body. Returns `false`
    /// when the entity has no body.
    pub fn apply_entity_impulse(
        &mut self,
        id: EntityId,
        impulse: Vec2,
    ) -> Result<bool, SimulationError> {
        match self.bodies.get(&id) {
            Some(body) => {
                self.physics.apply_body_impulse(body, impulse)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn apply_body_commands(&mut self, commands: Vec<BodyCommand>) -> Result<(), SimulationError> {
        for command in commands {
            match command {
                BodyCommand::SetVelocity(id, velocity) => {
                    if let Some(body) = self.bodies.get(&id) {
                        self.physics.set_body_velocity(body, velocity)?;
                    }
                }
                BodyCommand::Impulse(id, impulse) => {
                    if let Some(body) = self.bodies.get(&id) {
                        self.physics.apply_body_impulse(body, impulse)?;
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn create_body_for(
        &mut self,
        id: EntityId,
        spec: BodySpec,
        position: Vec2,
        rotation: f32,
    ) -> Result<(), SimulationError> {
        let shape = PhysicsShape::from_spec(spec.shape);
        let body = match spec.kind {
            BodyKind::Moving => self
                .physics
                .create_moving_body(&shape, position, rotation, id, true)?,
            BodyKind::Fixed => self
                .physics
                .create_static_body(&shape, position, rotation, id, true)?,
        };
        if spec.lock_rotation {
            self.physics.lock_body_rotation(&body)?;
        }
        self.bodies.insert(id, body);
        Ok(())
    }

    fn release_bodies_for(&mut self, destroyed: &[Entity]) -> Result<(), SimulationError> {
        for entity in destroyed {
            let Some(body) = self.bodies.remove(&entity.id()) else {
                continue;
            };
            match self.physics.destroy_body(&body) {
                Ok(()) | Err(PhysicsError::BodyNotInWorld) => {}
                Err(error) => return Err(error.into()),
            }
            self.physics.release_body(body)?;
        }
        Ok(())
    }

    fn collect_container_events(&mut self) {
        for event in self.container.take_events() {
            self.events.push(event.into());
        }
    }
}

impl Drop for WorldSimulation {
    fn drop(&mut self) {
        // Entities go first so their destroyed events and body releases run
        // while the physics world is still alive.
        if self.destroy_all_entities(None).is_err() {
            warn!("physics world was already released during simulation teardown");
        }
    }
}

impl std::fmt::Debug for WorldSimulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldSimulation")
            .field("entities", &self.container.len())
            .field("bodies", &self.bodies.len())
            .field("step_count", &self.step_count)
            .field("initialized", &self.initialized)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
