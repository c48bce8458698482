//! Tidepool physics bridge -- opaque-handle ownership wrappers over the
//! simulation engine.
//!
//! The engine itself (the [`native`] module) is treated as a black box: a
//! versioned handle API over reference-counted body slots. This crate's job
//! is purely create/destroy/call-through and reference-count-safe disposal:
//!
//! - [`PhysicalWorld`](world::PhysicalWorld) exclusively owns one engine
//!   world; release is explicit and terminal, drop is the guaranteed
//!   fallback.
//! - [`PhysicsBody`](body::PhysicsBody) owns one reference to a body slot;
//!   wrappers are move-only and duplicating one takes an explicit extra
//!   reference. Dropped-but-never-released wrappers are reclaimed through a
//!   deferred release queue.
//! - [`PhysicsShape`](shape::PhysicsShape) wraps the engine's shared shape
//!   storage.
//!
//! Every operation on a released handle fails with
//! [`PhysicsError::DisposedHandle`]; nothing here ever dereferences a dead
//! handle.
//!
//! # Quick Start
//!
//! ```
//! use tidepool_physics::prelude::*;
//! use tidepool_entity::prelude::{EntityId, Vec2};
//!
//! tidepool_physics::check_api_version().unwrap();
//!
//! let mut world = PhysicalWorld::new();
//! let shape = PhysicsShape::ball(0.5);
//! let body = world
//!     .create_moving_body(&shape, Vec2::ZERO, 0.0, EntityId::UNSET, true)
//!     .unwrap();
//!
//! world.set_body_velocity(&body, Vec2::new(5.0, 0.0)).unwrap();
//! world.step(1.0 / 60.0).unwrap();
//!
//! let (position, _rotation) = world.read_body_transform(&body).unwrap();
//! assert!(position.x > 0.0);
//! ```

#![deny(unsafe_code)]

pub mod body;
pub mod debug_draw;
pub mod native;
pub mod shape;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the physics bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PhysicsError {
    /// A handle was used after its owning wrapper released its engine
    /// reference. Terminal lifetime bug; never retried.
    #[error("{0} used after its native reference was released")]
    DisposedHandle(&'static str),

    /// The engine reports an API version this bridge was not built against.
    /// Startup-only; initialization must abort.
    #[error("native physics API version {actual} does not match required version {expected}")]
    IncompatibleNativeVersion {
        /// Version this bridge expects.
        expected: u32,
        /// Version the engine reported.
        actual: u32,
    },

    /// A body handle does not resolve to a live slot (stale generation or a
    /// body from a different world).
    #[error("unknown or stale physics body handle")]
    UnknownBody,

    /// The body exists but is not currently part of the simulation.
    #[error("body is not currently in the physics world")]
    BodyNotInWorld,
}

// ---------------------------------------------------------------------------
// API version check
// ---------------------------------------------------------------------------

/// Check the engine's reported API version against the one this bridge was
/// built for. Call once at startup and abort initialization on failure.
pub fn check_api_version() -> Result<(), PhysicsError> {
    verify_api_version(native::api_version())
}

/// Validate a reported engine API version.
pub fn verify_api_version(reported: u32) -> Result<(), PhysicsError> {
    if reported == native::NATIVE_API_VERSION {
        Ok(())
    } else {
        Err(PhysicsError::IncompatibleNativeVersion {
            expected: native::NATIVE_API_VERSION,
            actual: reported,
        })
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::body::PhysicsBody;
    pub use crate::debug_draw::{
        BufferedDebugDraw, DebugDrawLevel, DebugDrawSink, DebugLine, DebugTriangle,
    };
    pub use crate::native::{RawBodyHandle, NATIVE_PHYSICS_FRAME_RATE};
    pub use crate::shape::PhysicsShape;
    pub use crate::world::PhysicalWorld;
    pub use crate::{check_api_version, PhysicsError};
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_version_passes() {
        assert!(check_api_version().is_ok());
    }

    #[test]
    fn mismatched_version_fails_fast() {
        let result = verify_api_version(native::NATIVE_API_VERSION + 1);
        assert!(matches!(
            result,
            Err(PhysicsError::IncompatibleNativeVersion { .. })
        ));
    }
}
