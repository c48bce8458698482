//! Tidepool entity model -- identifiers, liveness, components, and the
//! two-arena container with deferred destruction.
//!
//! Entities here are records, not objects: a generational [`EntityId`],
//! a shared [`AliveMarker`], optional named groups, and a sparse set of typed
//! component records. Systems discover what an entity can do by checking
//! record presence. The [`EntityContainer`] owns every record from `add`
//! until its queued destruction is drained.
//!
//! # Quick Start
//!
//! ```
//! use tidepool_entity::prelude::*;
//!
//! let mut container = EntityContainer::new();
//! let id = container
//!     .add(Entity::new(Vec2::new(1.0, 0.0)).with_group("drifters"))
//!     .unwrap();
//!
//! assert!(container.is_in_world(id));
//! assert!(container.queue_destroy(id));
//! assert!(container.is_queued_for_destruction(id));
//!
//! let destroyed = container.drain_destroyed();
//! assert_eq!(destroyed.len(), 1);
//! assert!(!destroyed[0].is_alive());
//! ```

#![deny(unsafe_code)]

pub mod alive;
pub mod collision;
pub mod components;
pub mod container;
pub mod entity;
pub mod id;
pub mod math;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by entity lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EntityError {
    /// An entity whose alive marker is already false was handed to `add`.
    #[error("cannot add an entity whose alive marker is already false")]
    NotAlive,

    /// A fade time was declared for an entity that already has one.
    #[error("a fade time has already been declared for this entity")]
    FadeAlreadyDeclared,
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::alive::{AliveMarker, AliveWatch};
    pub use crate::collision::{BodyRef, CollisionFilter, CollisionManagement, CollisionRecord};
    pub use crate::components::{
        Agent, AgentPlan, BodyKind, BodySpec, CompoundId, Compounds, Conversion, Processor,
        ShapeSpec, TimedLife,
    };
    pub use crate::container::{EntityContainer, LifecycleEvent};
    pub use crate::entity::Entity;
    pub use crate::id::{EntityId, EntityIdAllocator};
    pub use crate::math::Vec2;
    pub use crate::EntityError;
}
