//! Tidepool engine -- the fixed-step world simulation driver.
//!
//! This crate ties the entity model and the physics bridge together into a
//! running simulation: a time accumulator decouples variable-rate frames
//! from fixed-rate logic, per-step systems run in a deterministic order,
//! entity destruction is deferred to one drain point per step, and the
//! physics world steps exactly once per logic step with bounded catch-up
//! when it falls behind.
//!
//! # Quick Start
//!
//! ```
//! use tidepool_engine::prelude::*;
//!
//! let mut sim = WorldSimulation::new(SimulationConfig::default());
//! sim.initialize().unwrap();
//!
//! let id = sim
//!     .add_entity(Entity::new(Vec2::new(0.0, 0.0)).with_group("drifters"))
//!     .unwrap();
//!
//! // One sixtieth of a second: exactly one logic step.
//! assert!(sim.process_logic(1.0 / 60.0).unwrap());
//! assert_eq!(sim.step_count(), 1);
//! assert!(sim.is_entity_in_world(id));
//! ```

#![deny(unsafe_code)]

pub mod events;
pub mod simulation;
pub mod snapshot;
pub mod spawn;
pub mod systems;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the simulation driver.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// A stepping entry point was called before one-time initialization.
    /// Programming error; fatal, never retried.
    #[error("the simulation must be initialized before it is stepped")]
    NotInitialized,

    /// `initialize` was called twice.
    #[error("this simulation was already initialized")]
    AlreadyInitialized,

    /// A physics bridge failure (disposed handle, version mismatch).
    #[error(transparent)]
    Physics(#[from] tidepool_physics::PhysicsError),

    /// An entity lifecycle violation (adding a dead entity).
    #[error(transparent)]
    Entity(#[from] tidepool_entity::EntityError),

    /// A snapshot failed its integrity check; nothing was restored.
    #[error("snapshot digest mismatch: stored {expected}, computed {computed}")]
    SnapshotDigestMismatch {
        /// Digest stored in the snapshot.
        expected: String,
        /// Digest recomputed from its fields.
        computed: String,
    },

    /// A snapshot could not be encoded or decoded.
    #[error("snapshot serialization failed: {0}")]
    SnapshotFormat(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use tidepool_entity::prelude::*;
    pub use tidepool_physics::prelude::*;

    pub use crate::events::WorldEvent;
    pub use crate::simulation::{SimulationConfig, WorldSimulation};
    pub use crate::snapshot::SimulationSnapshot;
    pub use crate::spawn::{NullSpawnPolicy, SpawnPolicy, SpawnRequests, SpawnView};
    pub use crate::systems::agents::{AgentFault, SenseSnapshot, AGENTS_PER_TASK};
    pub use crate::systems::currents::CurrentsSystem;
    pub use crate::systems::BodyCommand;
    pub use crate::SimulationError;
}
