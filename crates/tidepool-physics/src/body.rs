//! Owning wrapper for physics bodies.
//!
//! A [`PhysicsBody`] owns one engine-side reference to a body slot. The
//! wrapper is move-only; duplicating it requires an explicit reference-count
//! increment through [`PhysicalWorld::clone_body_ref`]. Disposal is terminal
//! and normally happens deterministically through
//! [`PhysicalWorld::release_body`]; a wrapper that is dropped without that
//! sends its handle down a deferred-release queue the world drains at its
//! next step, so leaked wrappers cannot leak engine memory.
//!
//! [`PhysicalWorld::release_body`]: crate::world::PhysicalWorld::release_body
//! [`PhysicalWorld::clone_body_ref`]: crate::world::PhysicalWorld::clone_body_ref

use rapier2d::crossbeam::channel::Sender;

use tidepool_entity::collision::BodyRef;

use crate::native::RawBodyHandle;
use crate::PhysicsError;

/// Handle to one rigid body inside exactly one physics world.
pub struct PhysicsBody {
    handle: RawBodyHandle,
    disposed: bool,
    release_tx: Sender<RawBodyHandle>,
}

impl PhysicsBody {
    pub(crate) fn new(handle: RawBodyHandle, release_tx: Sender<RawBodyHandle>) -> Self {
        Self {
            handle,
            disposed: false,
            release_tx,
        }
    }

    /// The engine handle. Fails once the wrapper has been disposed.
    pub fn handle(&self) -> Result<RawBodyHandle, PhysicsError> {
        if self.disposed {
            return Err(PhysicsError::DisposedHandle("physics body"));
        }
        Ok(self.handle)
    }

    /// The raw reference form used in collision records.
    pub fn body_ref(&self) -> Result<BodyRef, PhysicsError> {
        Ok(self.handle()?.body_ref())
    }

    /// Take the handle out for release, marking the wrapper disposed.
    pub(crate) fn take_for_release(&mut self) -> Result<RawBodyHandle, PhysicsError> {
        if self.disposed {
            return Err(PhysicsError::DisposedHandle("physics body"));
        }
        self.disposed = true;
        Ok(self.handle)
    }
}

impl Drop for PhysicsBody {
    fn drop(&mut self) {
        if !self.disposed {
            // Last-resort release; the world drains this at its next step.
            // A closed channel means the world is already gone, taking the
            // slot with it.
            let _ = self.release_tx.send(self.handle);
        }
    }
}

impl std::fmt::Debug for PhysicsBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsBody")
            .field("handle", &self.handle)
            .field("disposed", &self.disposed)
            .finish()
    }
}
