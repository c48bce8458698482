//! The engine side of the physics bridge.
//!
//! Everything in this module plays the role of the opaque native library:
//! a handle table of reference-counted body slots in front of a rapier2d
//! simulation. Nothing outside this module names a rapier type; the safe
//! wrappers in [`world`](crate::world) and [`body`](crate::body) talk to it
//! exclusively through [`RawBodyHandle`]s, mirroring a C ABI where handles
//! are the only currency.
//!
//! The engine rate-limits itself: [`NativeWorld::step`] accumulates wall
//! time and advances in fixed sub-steps of `1 / NATIVE_PHYSICS_FRAME_RATE`
//! seconds, at most [`MAX_SUBSTEPS_PER_CALL`] per call. Debt left over is
//! visible through [`NativeWorld::steps_behind`] so the driver can run
//! bounded catch-up calls.

use std::collections::HashMap;
use std::time::Instant;

use rapier2d::crossbeam::channel::{unbounded, Receiver, Sender};
use rapier2d::prelude::*;
use tracing::trace;

use tidepool_entity::collision::{BodyRef, CollisionFilter, CollisionRecord};
use tidepool_entity::components::{BodyKind, ShapeSpec};
use tidepool_entity::id::EntityId;
use tidepool_entity::math::Vec2;

use crate::debug_draw::{DebugDrawLevel, DebugDrawSink, DebugLine, DebugTriangle};

// ---------------------------------------------------------------------------
// Versioning and constants
// ---------------------------------------------------------------------------

/// Version of the engine-side API this module implements. The wrapper layer
/// refuses to initialize against a mismatching report.
pub const NATIVE_API_VERSION: u32 = 3;

/// Fixed internal simulation rate, frames per second.
pub const NATIVE_PHYSICS_FRAME_RATE: f32 = 60.0;

/// Upper bound on sub-steps a single [`NativeWorld::step`] call will run.
/// Remaining debt is reported through [`NativeWorld::steps_behind`] and
/// worked off by the driver's catch-up calls.
pub const MAX_SUBSTEPS_PER_CALL: u32 = 2;

/// Bodies farther than this from the reported camera position are skipped
/// by debug drawing.
const DEBUG_DRAW_CULL_DISTANCE: f32 = 200.0;

/// Segments used to approximate a ball outline in debug drawing.
const DEBUG_BALL_SEGMENTS: u32 = 12;

/// What the engine reports as its compiled API version.
pub fn api_version() -> u32 {
    NATIVE_API_VERSION
}

// ---------------------------------------------------------------------------
// RawBodyHandle
// ---------------------------------------------------------------------------

/// Opaque handle to a body slot. Generational, so a handle kept across the
/// slot's reuse is detectably stale instead of aliasing a new body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawBodyHandle {
    index: u32,
    generation: u32,
}

impl RawBodyHandle {
    /// Raw `u64` form carried in collision records.
    #[inline]
    pub fn to_raw(self) -> u64 {
        (self.generation as u64) << 32 | self.index as u64
    }

    /// The [`BodyRef`] form used by the entity layer.
    #[inline]
    pub fn body_ref(self) -> BodyRef {
        BodyRef(self.to_raw())
    }
}

// ---------------------------------------------------------------------------
// NativeShape
// ---------------------------------------------------------------------------

/// A built collision shape. The underlying storage is shared and reference
/// counted on the engine side; cloning one increments that count.
#[derive(Clone)]
pub struct NativeShape {
    pub(crate) shared: SharedShape,
    pub(crate) spec: ShapeSpec,
}

impl NativeShape {
    /// Build a shape from its logical description.
    pub fn build(spec: ShapeSpec) -> Self {
        let shared = match spec {
            ShapeSpec::Ball { radius } => SharedShape::ball(radius),
            ShapeSpec::Cuboid {
                half_width,
                half_height,
            } => SharedShape::cuboid(half_width, half_height),
        };
        Self { shared, spec }
    }

    /// The logical description this shape was built from.
    pub fn spec(&self) -> ShapeSpec {
        self.spec
    }
}

// ---------------------------------------------------------------------------
// Body slots
// ---------------------------------------------------------------------------

/// Collision recording state for one body.
struct RecordingState {
    max: u32,
    records: Vec<CollisionRecord>,
}

/// One reference-counted body slot.
struct BodySlot {
    generation: u32,
    rigid_body: RigidBodyHandle,
    collider: ColliderHandle,
    /// One count per wrapper reference plus one while the body is in the
    /// world. The slot is freed when this reaches zero.
    ref_count: u32,
    in_world: bool,
    entity: EntityId,
    shape: ShapeSpec,
    recording: Option<RecordingState>,
    ignored: Vec<RawBodyHandle>,
    filter: Option<CollisionFilter>,
}

// ---------------------------------------------------------------------------
// Contact filtering hooks
// ---------------------------------------------------------------------------

/// Narrow-phase hook enforcing per-body ignore lists and filter predicates
/// before a contact is allowed to exist.
struct ContactHooks<'a> {
    slots: &'a [Option<BodySlot>],
    collider_to_slot: &'a HashMap<ColliderHandle, usize>,
}

impl ContactHooks<'_> {
    fn slot_for(&self, collider: ColliderHandle) -> Option<(usize, &BodySlot)> {
        let index = *self.collider_to_slot.get(&collider)?;
        self.slots[index].as_ref().map(|slot| (index, slot))
    }
}

impl PhysicsHooks for ContactHooks<'_> {
    fn filter_contact_pair(&self, context: &PairFilterContext) -> Option<SolverFlags> {
        let Some((index_a, slot_a)) = self.slot_for(context.collider1) else {
            return Some(SolverFlags::COMPUTE_IMPULSES);
        };
        let Some((index_b, slot_b)) = self.slot_for(context.collider2) else {
            return Some(SolverFlags::COMPUTE_IMPULSES);
        };

        let handle_a = RawBodyHandle {
            index: index_a as u32,
            generation: slot_a.generation,
        };
        let handle_b = RawBodyHandle {
            index: index_b as u32,
            generation: slot_b.generation,
        };

        if slot_a.ignored.contains(&handle_b) || slot_b.ignored.contains(&handle_a) {
            return None;
        }

        // Filters run before the solver, so penetration is not resolved yet
        // and reads as zero in the record the predicate sees.
        if slot_a.filter.is_some() || slot_b.filter.is_some() {
            let record = contact_record(handle_a, slot_a, 0, handle_b, slot_b, 0, 0.0);
            if let Some(filter) = &slot_a.filter {
                if !filter(&record) {
                    return None;
                }
            }
            if let Some(filter) = &slot_b.filter {
                if !filter(&flip_record(&record)) {
                    return None;
                }
            }
        }

        Some(SolverFlags::COMPUTE_IMPULSES)
    }
}

fn contact_record(
    first: RawBodyHandle,
    first_slot: &BodySlot,
    first_sub_shape: u32,
    second: RawBodyHandle,
    second_slot: &BodySlot,
    second_sub_shape: u32,
    penetration: f32,
) -> CollisionRecord {
    CollisionRecord {
        first_body: first.body_ref(),
        first_entity: first_slot.entity,
        first_sub_shape,
        second_body: second.body_ref(),
        second_entity: second_slot.entity,
        second_sub_shape,
        penetration,
    }
}

fn flip_record(record: &CollisionRecord) -> CollisionRecord {
    CollisionRecord {
        first_body: record.second_body,
        first_entity: record.second_entity,
        first_sub_shape: record.second_sub_shape,
        second_body: record.first_body,
        second_entity: record.first_entity,
        second_sub_shape: record.first_sub_shape,
        penetration: record.penetration,
    }
}

// ---------------------------------------------------------------------------
// NativeWorld
// ---------------------------------------------------------------------------

/// The simulation core behind one physics world handle.
pub struct NativeWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,

    slots: Vec<Option<BodySlot>>,
    /// Next generation per slot index, bumped whenever a slot is freed.
    slot_generations: Vec<u32>,
    free_slots: Vec<u32>,
    collider_to_slot: HashMap<ColliderHandle, usize>,

    /// Wall time handed in but not yet simulated.
    accumulated: f32,
    /// Finalizer path: wrappers dropped without explicit release send their
    /// handle here; the queue is drained at the start of every step.
    release_rx: Receiver<RawBodyHandle>,
    release_tx: Sender<RawBodyHandle>,

    latest_step_seconds: f32,
    average_step_seconds: f32,

    debug_sink: Option<Box<dyn DebugDrawSink>>,
    debug_level: DebugDrawLevel,
    camera_position: Vec2,
}

impl NativeWorld {
    /// A fresh world with no bodies. Microbial scale: no gravity, motion
    /// comes entirely from the entities themselves and ambient currents.
    pub fn new() -> Self {
        let (release_tx, release_rx) = unbounded();
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![0.0, 0.0],
            integration_params: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            slots: Vec::new(),
            slot_generations: Vec::new(),
            free_slots: Vec::new(),
            collider_to_slot: HashMap::new(),
            accumulated: 0.0,
            release_rx,
            release_tx,
            latest_step_seconds: 0.0,
            average_step_seconds: 0.0,
            debug_sink: None,
            debug_level: DebugDrawLevel::OFF,
            camera_position: Vec2::ZERO,
        }
    }

    /// Sender for the deferred-release queue, handed to body wrappers.
    pub fn release_sender(&self) -> Sender<RawBodyHandle> {
        self.release_tx.clone()
    }

    // -- body lifecycle ------------------------------------------------------

    /// Create a body. The returned handle carries one wrapper reference;
    /// `add_to_world` additionally takes the world's own reference.
    #[allow(clippy::too_many_arguments)]
    pub fn create_body(
        &mut self,
        shape: &NativeShape,
        kind: BodyKind,
        position: Vec2,
        rotation: f32,
        entity: EntityId,
        add_to_world: bool,
    ) -> RawBodyHandle {
        let builder = match kind {
            BodyKind::Moving => RigidBodyBuilder::dynamic(),
            BodyKind::Fixed => RigidBodyBuilder::fixed(),
        }
        .translation(vector![position.x, position.y])
        .rotation(rotation)
        .enabled(add_to_world);
        let rigid_body = self.rigid_body_set.insert(builder.build());

        let collider = ColliderBuilder::new(shape.shared.clone())
            .enabled(add_to_world)
            .active_hooks(ActiveHooks::FILTER_CONTACT_PAIRS)
            .build();
        let collider =
            self.collider_set
                .insert_with_parent(collider, rigid_body, &mut self.rigid_body_set);

        let index = match self.free_slots.pop() {
            Some(index) => index as usize,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        if index >= self.slot_generations.len() {
            self.slot_generations.resize(index + 1, 0);
        }
        let generation = self.slot_generations[index];

        self.slots[index] = Some(BodySlot {
            generation,
            rigid_body,
            collider,
            ref_count: if add_to_world { 2 } else { 1 },
            in_world: add_to_world,
            entity,
            shape: shape.spec,
            recording: None,
            ignored: Vec::new(),
            filter: None,
        });
        self.collider_to_slot.insert(collider, index);

        RawBodyHandle {
            index: index as u32,
            generation,
        }
    }

    /// Add a previously created (but not world-added) body to the world,
    /// taking the world's reference. Returns `false` when the body was
    /// already in the world.
    pub fn add_body(&mut self, handle: RawBodyHandle, activate: bool) -> Option<bool> {
        let slot = self.slot_mut(handle)?;
        if slot.in_world {
            return Some(false);
        }
        slot.in_world = true;
        slot.ref_count += 1;
        let rb_handle = slot.rigid_body;
        let col_handle = slot.collider;
        if let Some(rb) = self.rigid_body_set.get_mut(rb_handle) {
            rb.set_enabled(true);
            if activate {
                rb.wake_up(true);
            }
        }
        if let Some(col) = self.collider_set.get_mut(col_handle) {
            col.set_enabled(true);
        }
        Some(true)
    }

    /// Remove a body from the world, dropping the world's reference.
    /// Returns `false` when the body was not in the world.
    pub fn remove_body_from_world(&mut self, handle: RawBodyHandle) -> Option<bool> {
        let slot = self.slot_mut(handle)?;
        if !slot.in_world {
            return Some(false);
        }
        slot.in_world = false;
        let rb_handle = slot.rigid_body;
        let col_handle = slot.collider;
        if let Some(rb) = self.rigid_body_set.get_mut(rb_handle) {
            rb.set_enabled(false);
        }
        if let Some(col) = self.collider_set.get_mut(col_handle) {
            col.set_enabled(false);
        }
        self.release_ref(handle);
        Some(true)
    }

    /// Increment a body's reference count (explicit handle duplication).
    pub fn add_ref(&mut self, handle: RawBodyHandle) -> bool {
        match self.slot_mut(handle) {
            Some(slot) => {
                slot.ref_count += 1;
                true
            }
            None => false,
        }
    }

    /// Drop one reference. Frees the slot -- and the underlying body --
    /// when the count reaches zero. Returns the remaining count, or `None`
    /// for stale handles.
    pub fn release_ref(&mut self, handle: RawBodyHandle) -> Option<u32> {
        let index = handle.index as usize;
        {
            let slot = self.slots.get_mut(index)?.as_mut()?;
            if slot.generation != handle.generation {
                return None;
            }
            slot.ref_count = slot.ref_count.saturating_sub(1);
            if slot.ref_count > 0 {
                return Some(slot.ref_count);
            }
        }

        let slot = self.slots[index].take().expect("slot checked above");
        self.collider_to_slot.remove(&slot.collider);
        self.rigid_body_set.remove(
            slot.rigid_body,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
        self.slot_generations[index] = slot.generation.wrapping_add(1);
        self.free_slots.push(handle.index);
        trace!(body = handle.to_raw(), "body slot freed");
        Some(0)
    }

    /// Whether the handle refers to a live slot.
    pub fn is_live(&self, handle: RawBodyHandle) -> bool {
        self.slot(handle).is_some()
    }

    /// Number of live body slots.
    pub fn body_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    fn slot(&self, handle: RawBodyHandle) -> Option<&BodySlot> {
        let slot = self.slots.get(handle.index as usize)?.as_ref()?;
        (slot.generation == handle.generation).then_some(slot)
    }

    fn slot_mut(&mut self, handle: RawBodyHandle) -> Option<&mut BodySlot> {
        let slot = self.slots.get_mut(handle.index as usize)?.as_mut()?;
        (slot.generation == handle.generation).then_some(slot)
    }

    // -- body state ----------------------------------------------------------

    /// Current position and rotation of a body.
    pub fn read_transform(&self, handle: RawBodyHandle) -> Option<(Vec2, f32)> {
        let slot = self.slot(handle)?;
        let rb = self.rigid_body_set.get(slot.rigid_body)?;
        let translation = rb.translation();
        Some((
            Vec2::new(translation.x, translation.y),
            rb.rotation().angle(),
        ))
    }

    /// Drive a body at a velocity (wakes it).
    pub fn set_velocity(&mut self, handle: RawBodyHandle, velocity: Vec2) -> bool {
        let Some(slot) = self.slot(handle) else {
            return false;
        };
        let rb_handle = slot.rigid_body;
        match self.rigid_body_set.get_mut(rb_handle) {
            Some(rb) => {
                rb.set_linvel(vector![velocity.x, velocity.y], true);
                true
            }
            None => false,
        }
    }

    /// Apply an instantaneous impulse.
    pub fn apply_impulse(&mut self, handle: RawBodyHandle, impulse: Vec2) -> bool {
        let Some(slot) = self.slot(handle) else {
            return false;
        };
        let rb_handle = slot.rigid_body;
        match self.rigid_body_set.get_mut(rb_handle) {
            Some(rb) => {
                rb.apply_impulse(vector![impulse.x, impulse.y], true);
                true
            }
            None => false,
        }
    }

    /// Stop the solver from ever spinning this body. The 2D equivalent of
    /// the axis lock used to keep cells upright in their plane.
    pub fn lock_rotation(&mut self, handle: RawBodyHandle) -> bool {
        let Some(slot) = self.slot(handle) else {
            return false;
        };
        let rb_handle = slot.rigid_body;
        match self.rigid_body_set.get_mut(rb_handle) {
            Some(rb) => {
                rb.lock_rotations(true, true);
                true
            }
            None => false,
        }
    }

    /// Teleport a body. Used when logical state is restored from a save.
    pub fn set_transform(&mut self, handle: RawBodyHandle, position: Vec2, rotation: f32) -> bool {
        let Some(slot) = self.slot(handle) else {
            return false;
        };
        let rb_handle = slot.rigid_body;
        match self.rigid_body_set.get_mut(rb_handle) {
            Some(rb) => {
                rb.set_translation(vector![position.x, position.y], true);
                rb.set_rotation(Rotation::new(rotation), true);
                true
            }
            None => false,
        }
    }

    // -- collision configuration ---------------------------------------------

    /// Enable collision recording with the given capacity. Increase-only;
    /// the engine never shrinks or disables an existing recording.
    pub fn set_recording(&mut self, handle: RawBodyHandle, max: u32) -> bool {
        let Some(slot) = self.slot_mut(handle) else {
            return false;
        };
        match &mut slot.recording {
            Some(state) => {
                if max > state.max {
                    state.max = max;
                }
            }
            None if max > 0 => {
                slot.recording = Some(RecordingState {
                    max,
                    records: Vec::with_capacity(max as usize),
                });
            }
            None => {}
        }
        true
    }

    /// Records captured for this body by the most recent step.
    pub fn recorded(&self, handle: RawBodyHandle) -> &[CollisionRecord] {
        self.slot(handle)
            .and_then(|slot| slot.recording.as_ref())
            .map_or(&[], |state| &state.records)
    }

    /// Replace the body's collision ignore list.
    pub fn set_ignores(&mut self, handle: RawBodyHandle, ignored: Vec<RawBodyHandle>) -> bool {
        match self.slot_mut(handle) {
            Some(slot) => {
                slot.ignored = ignored;
                true
            }
            None => false,
        }
    }

    /// Install or clear the body's contact filter predicate.
    pub fn set_filter(&mut self, handle: RawBodyHandle, filter: Option<CollisionFilter>) -> bool {
        match self.slot_mut(handle) {
            Some(slot) => {
                slot.filter = filter;
                true
            }
            None => false,
        }
    }

    // -- stepping ------------------------------------------------------------

    /// Advance the simulation. Adds `delta` to the internal accumulator and
    /// runs up to [`MAX_SUBSTEPS_PER_CALL`] fixed sub-steps. Returns whether
    /// any sub-step ran.
    pub fn step(&mut self, delta: f32) -> bool {
        self.drain_release_queue();

        self.accumulated += delta;
        let frame = 1.0 / NATIVE_PHYSICS_FRAME_RATE;

        let started = Instant::now();
        let mut stepped = false;
        let mut substeps = 0;
        while self.accumulated >= frame && substeps < MAX_SUBSTEPS_PER_CALL {
            self.accumulated -= frame;
            self.run_substep(frame);
            stepped = true;
            substeps += 1;
        }

        if !stepped {
            return false;
        }

        self.latest_step_seconds = started.elapsed().as_secs_f32();
        self.average_step_seconds = if self.average_step_seconds == 0.0 {
            self.latest_step_seconds
        } else {
            self.average_step_seconds * 0.9 + self.latest_step_seconds * 0.1
        };

        self.capture_collisions();
        self.draw_debug();
        true
    }

    /// Whole fixed frames of accumulated debt not yet simulated.
    pub fn steps_behind(&self) -> u32 {
        (self.accumulated * NATIVE_PHYSICS_FRAME_RATE) as u32
    }

    /// Wall-clock seconds the latest stepped call spent simulating.
    pub fn latest_step_seconds(&self) -> f32 {
        self.latest_step_seconds
    }

    /// Rolling average of step durations.
    pub fn average_step_seconds(&self) -> f32 {
        self.average_step_seconds
    }

    fn run_substep(&mut self, dt: f32) {
        self.integration_params.dt = dt;
        let hooks = ContactHooks {
            slots: &self.slots,
            collider_to_slot: &self.collider_to_slot,
        };
        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &hooks,
            &(),
        );
    }

    fn drain_release_queue(&mut self) {
        while let Ok(handle) = self.release_rx.try_recv() {
            self.release_ref(handle);
        }
    }

    /// Harvest this step's contacts into the per-body record buffers.
    ///
    /// Pairs are sorted by slot index before distribution so record order is
    /// identical across runs regardless of narrow-phase iteration order.
    fn capture_collisions(&mut self) {
        struct Contact {
            slot_a: usize,
            slot_b: usize,
            sub_shape_a: u32,
            sub_shape_b: u32,
            penetration: f32,
        }

        let mut contacts = Vec::new();
        for pair in self.narrow_phase.contact_pairs() {
            let Some(&slot_a) = self.collider_to_slot.get(&pair.collider1) else {
                continue;
            };
            let Some(&slot_b) = self.collider_to_slot.get(&pair.collider2) else {
                continue;
            };

            let mut deepest: Option<(f32, u32, u32)> = None;
            for manifold in &pair.manifolds {
                for point in &manifold.points {
                    let penetration = -point.dist;
                    if penetration > 0.0 && deepest.map_or(true, |(best, _, _)| penetration > best)
                    {
                        deepest = Some((penetration, manifold.subshape1, manifold.subshape2));
                    }
                }
            }
            if let Some((penetration, sub_shape_a, sub_shape_b)) = deepest {
                contacts.push(Contact {
                    slot_a,
                    slot_b,
                    sub_shape_a,
                    sub_shape_b,
                    penetration,
                });
            }
        }
        contacts.sort_by_key(|c| (c.slot_a.min(c.slot_b), c.slot_a.max(c.slot_b)));

        for slot in self.slots.iter_mut().flatten() {
            if let Some(state) = &mut slot.recording {
                state.records.clear();
            }
        }

        for contact in contacts {
            let record = {
                let Some(slot_a) = self.slots[contact.slot_a].as_ref() else {
                    continue;
                };
                let Some(slot_b) = self.slots[contact.slot_b].as_ref() else {
                    continue;
                };
                let handle_a = RawBodyHandle {
                    index: contact.slot_a as u32,
                    generation: slot_a.generation,
                };
                let handle_b = RawBodyHandle {
                    index: contact.slot_b as u32,
                    generation: slot_b.generation,
                };
                contact_record(
                    handle_a,
                    slot_a,
                    contact.sub_shape_a,
                    handle_b,
                    slot_b,
                    contact.sub_shape_b,
                    contact.penetration,
                )
            };

            if let Some(state) = self.slots[contact.slot_a]
                .as_mut()
                .and_then(|s| s.recording.as_mut())
            {
                if state.records.len() < state.max as usize {
                    state.records.push(record);
                }
            }
            if let Some(state) = self.slots[contact.slot_b]
                .as_mut()
                .and_then(|s| s.recording.as_mut())
            {
                if state.records.len() < state.max as usize {
                    state.records.push(flip_record(&record));
                }
            }
        }
    }

    // -- debug drawing -------------------------------------------------------

    /// Install a debug draw sink at the given verbosity level. Level zero
    /// removes the sink entirely.
    pub fn set_debug_draw(&mut self, level: DebugDrawLevel, sink: Option<Box<dyn DebugDrawSink>>) {
        if level == DebugDrawLevel::OFF {
            self.debug_sink = None;
            self.debug_level = DebugDrawLevel::OFF;
        } else {
            self.debug_sink = sink;
            self.debug_level = level;
        }
    }

    /// Update the camera position used to cull far-away debug geometry.
    pub fn set_camera_position(&mut self, position: Vec2) {
        self.camera_position = position;
    }

    fn draw_debug(&mut self) {
        let Some(sink) = self.debug_sink.as_mut() else {
            return;
        };
        let level = self.debug_level;

        for slot in self.slots.iter().flatten() {
            if !slot.in_world {
                continue;
            }
            let Some(rb) = self.rigid_body_set.get(slot.rigid_body) else {
                continue;
            };
            let translation = rb.translation();
            let center = Vec2::new(translation.x, translation.y);
            if center.distance(self.camera_position) > DEBUG_DRAW_CULL_DISTANCE {
                continue;
            }
            let angle = rb.rotation().angle();

            let outline = shape_outline(slot.shape, center, angle);
            for i in 0..outline.len() {
                sink.draw_line(DebugLine {
                    from: outline[i],
                    to: outline[(i + 1) % outline.len()],
                });
            }

            if level >= DebugDrawLevel::SOLID && outline.len() >= 3 {
                for i in 1..outline.len() - 1 {
                    sink.draw_triangle(DebugTriangle {
                        a: outline[0],
                        b: outline[i],
                        c: outline[i + 1],
                    });
                }
            }
        }
    }
}

impl Default for NativeWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Vertices of a shape's outline in world space, counter-clockwise.
fn shape_outline(shape: ShapeSpec, center: Vec2, angle: f32) -> Vec<Vec2> {
    let (sin, cos) = angle.sin_cos();
    let rotate = |v: Vec2| Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos);
    match shape {
        ShapeSpec::Ball { radius } => (0..DEBUG_BALL_SEGMENTS)
            .map(|i| {
                let theta = i as f32 / DEBUG_BALL_SEGMENTS as f32 * std::f32::consts::TAU;
                center + Vec2::new(theta.cos() * radius, theta.sin() * radius)
            })
            .collect(),
        ShapeSpec::Cuboid {
            half_width,
            half_height,
        } => [
            Vec2::new(-half_width, -half_height),
            Vec2::new(half_width, -half_height),
            Vec2::new(half_width, half_height),
            Vec2::new(-half_width, half_height),
        ]
        .into_iter()
        .map(|corner| center + rotate(corner))
        .collect(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
