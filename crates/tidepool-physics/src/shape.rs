//! Owning wrapper for physics shapes.
//!
//! Shapes are reference counted on the engine side; a [`PhysicsShape`]
//! wrapper owns exactly one of those references. Wrappers are move-only --
//! duplicating one goes through [`clone_ref`](PhysicsShape::clone_ref),
//! which explicitly takes another engine reference. Release is terminal.

use tidepool_entity::components::ShapeSpec;

use crate::native::NativeShape;
use crate::PhysicsError;

/// A collision shape handle.
pub struct PhysicsShape {
    inner: Option<NativeShape>,
}

impl PhysicsShape {
    /// A ball shape.
    pub fn ball(radius: f32) -> Self {
        Self::from_spec(ShapeSpec::Ball { radius })
    }

    /// An axis-aligned box shape with half-extents.
    pub fn cuboid(half_width: f32, half_height: f32) -> Self {
        Self::from_spec(ShapeSpec::Cuboid {
            half_width,
            half_height,
        })
    }

    /// Build from a logical shape description.
    pub fn from_spec(spec: ShapeSpec) -> Self {
        Self {
            inner: Some(NativeShape::build(spec)),
        }
    }

    /// The logical description this shape was built from.
    pub fn spec(&self) -> Result<ShapeSpec, PhysicsError> {
        Ok(self.access()?.spec())
    }

    /// Duplicate the handle, taking another engine-side reference.
    pub fn clone_ref(&self) -> Result<PhysicsShape, PhysicsError> {
        Ok(Self {
            inner: Some(self.access()?.clone()),
        })
    }

    /// Release this wrapper's reference. Terminal: every later use of the
    /// wrapper fails with [`PhysicsError::DisposedHandle`].
    pub fn release(&mut self) -> Result<(), PhysicsError> {
        match self.inner.take() {
            Some(_) => Ok(()),
            None => Err(PhysicsError::DisposedHandle("physics shape")),
        }
    }

    pub(crate) fn access(&self) -> Result<&NativeShape, PhysicsError> {
        self.inner
            .as_ref()
            .ok_or(PhysicsError::DisposedHandle("physics shape"))
    }
}

// Dropping an unreleased wrapper simply lets the engine reference fall out;
// that is the last-resort path, explicit release is the normal one.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_roundtrip() {
        let shape = PhysicsShape::ball(0.5);
        assert_eq!(shape.spec().unwrap(), ShapeSpec::Ball { radius: 0.5 });
    }

    #[test]
    fn release_is_terminal() {
        let mut shape = PhysicsShape::cuboid(1.0, 2.0);
        shape.release().unwrap();
        assert!(matches!(
            shape.spec(),
            Err(PhysicsError::DisposedHandle("physics shape"))
        ));
        assert!(matches!(
            shape.clone_ref(),
            Err(PhysicsError::DisposedHandle("physics shape"))
        ));
        assert!(matches!(
            shape.release(),
            Err(PhysicsError::DisposedHandle("physics shape"))
        ));
    }

    #[test]
    fn clone_ref_survives_original_release() {
        let mut shape = PhysicsShape::ball(1.0);
        let copy = shape.clone_ref().unwrap();
        shape.release().unwrap();
        assert_eq!(copy.spec().unwrap(), ShapeSpec::Ball { radius: 1.0 });
    }
}
