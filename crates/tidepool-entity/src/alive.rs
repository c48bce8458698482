//! Shared liveness flags.
//!
//! An [`AliveMarker`] is the single source of truth for whether an entity's
//! destruction-time logic should still run. Collaborators that need to check
//! liveness hold an [`AliveWatch`] -- a read-only handle on the same flag --
//! instead of a strong reference back to the container, which would create
//! reference cycles across subsystems.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// AliveMarker
// ---------------------------------------------------------------------------

/// Writer side of a shared liveness flag. Owned by the entity record.
///
/// Starts alive. Once [`mark_dead`](Self::mark_dead) has been called the flag
/// never goes back to alive; death is terminal.
#[derive(Debug, Clone)]
pub struct AliveMarker {
    flag: Arc<AtomicBool>,
}

impl AliveMarker {
    /// A fresh marker in the alive state.
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether the entity is still alive.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Flip the flag to dead. Idempotent.
    pub fn mark_dead(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// A read-only handle on this flag for collaborators.
    pub fn watch(&self) -> AliveWatch {
        AliveWatch {
            flag: Arc::clone(&self.flag),
        }
    }

    /// A fresh, independent marker seeded from the current value. Cloning a
    /// marker shares the flag; detaching copies it.
    pub fn detached(&self) -> AliveMarker {
        let marker = AliveMarker::new();
        if !self.is_alive() {
            marker.mark_dead();
        }
        marker
    }
}

impl Default for AliveMarker {
    fn default() -> Self {
        Self::new()
    }
}

// The shared flag itself is transient runtime state: a restored entity gets a
// fresh flag seeded from the saved liveness value, and any watches from the
// previous session are intentionally orphaned.
impl Serialize for AliveMarker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(self.is_alive())
    }
}

impl<'de> Deserialize<'de> for AliveMarker {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let alive = bool::deserialize(deserializer)?;
        let marker = AliveMarker::new();
        if !alive {
            marker.mark_dead();
        }
        Ok(marker)
    }
}

// ---------------------------------------------------------------------------
// AliveWatch
// ---------------------------------------------------------------------------

/// Read-only view of an [`AliveMarker`].
///
/// Cheap to clone and safe to hold indefinitely; it keeps only the flag
/// itself alive, never the entity or its container.
#[derive(Debug, Clone)]
pub struct AliveWatch {
    flag: Arc<AtomicBool>,
}

impl AliveWatch {
    /// Whether the watched entity is still alive.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_alive() {
        let marker = AliveMarker::new();
        assert!(marker.is_alive());
        assert!(marker.watch().is_alive());
    }

    #[test]
    fn watch_observes_death() {
        let marker = AliveMarker::new();
        let watch = marker.watch();
        marker.mark_dead();
        assert!(!marker.is_alive());
        assert!(!watch.is_alive());
    }

    #[test]
    fn mark_dead_is_idempotent() {
        let marker = AliveMarker::new();
        marker.mark_dead();
        marker.mark_dead();
        assert!(!marker.is_alive());
    }

    #[test]
    fn watch_outlives_marker() {
        let watch = {
            let marker = AliveMarker::new();
            marker.mark_dead();
            marker.watch()
        };
        assert!(!watch.is_alive());
    }

    #[test]
    fn detached_copies_value_but_not_flag() {
        let marker = AliveMarker::new();
        let copy = marker.detached();
        marker.mark_dead();
        assert!(copy.is_alive(), "detached copy must not share the flag");

        let dead_copy = marker.detached();
        assert!(!dead_copy.is_alive());
    }

    #[test]
    fn serde_roundtrips_liveness() {
        let marker = AliveMarker::new();
        marker.mark_dead();
        let json = serde_json::to_string(&marker).unwrap();
        assert_eq!(json, "false");
        let restored: AliveMarker = serde_json::from_str(&json).unwrap();
        assert!(!restored.is_alive());
    }
}
