//! Per-entity collision bookkeeping.
//!
//! The physics engine produces [`CollisionRecord`]s during its step; entities
//! that opted in via [`CollisionManagement::start_recording`] get the records
//! of the most recent step written into a fixed-capacity buffer that gameplay
//! reads without any per-collision allocation. The logical settings here
//! (recording limit, ignore list, filter) only take effect once a
//! synchronization pass has pushed them to the engine side and flipped
//! [`state_applied`](CollisionManagement::state_applied) back to true.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::id::EntityId;

// ---------------------------------------------------------------------------
// CollisionRecord
// ---------------------------------------------------------------------------

/// Raw identifier of a native physics body as it appears in collision
/// records. Purely informational at this layer; resolving it back to a live
/// body is the bridge's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyRef(pub u64);

/// Immutable snapshot of one contact observed during a physics step.
///
/// Valid from the end of the step that produced it until the start of the
/// next one; the buffer is overwritten, not appended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionRecord {
    /// Body of the entity that recorded this collision.
    pub first_body: BodyRef,
    /// Entity that recorded this collision.
    pub first_entity: EntityId,
    /// Sub-shape hit on the first body.
    pub first_sub_shape: u32,
    /// The other body.
    pub second_body: BodyRef,
    /// The other entity.
    pub second_entity: EntityId,
    /// Sub-shape hit on the second body.
    pub second_sub_shape: u32,
    /// How deep the shapes overlap.
    pub penetration: f32,
}

impl CollisionRecord {
    /// An empty slot value used to pre-fill record buffers.
    pub const EMPTY: CollisionRecord = CollisionRecord {
        first_body: BodyRef(0),
        first_entity: EntityId::UNSET,
        first_sub_shape: 0,
        second_body: BodyRef(0),
        second_entity: EntityId::UNSET,
        second_sub_shape: 0,
        penetration: 0.0,
    };
}

/// Predicate consulted by the physics engine before a contact involving the
/// owning entity is allowed to register. Returning `false` suppresses the
/// contact. Runs during the physics step, so it must not touch shared
/// mutable state.
pub type CollisionFilter = Arc<dyn Fn(&CollisionRecord) -> bool + Send + Sync>;

// ---------------------------------------------------------------------------
// CollisionManagement
// ---------------------------------------------------------------------------

/// Collision settings and the live record buffer for one entity.
#[derive(Clone, Serialize, Deserialize)]
pub struct CollisionManagement {
    /// Maximum records captured per step. Zero disables recording. Raising
    /// the value after the buffer exists does not grow the buffer; callers
    /// must pick their maximum before the first synchronization.
    record_limit: u32,
    /// Entities whose mutual collisions are suppressed.
    ignored: Vec<EntityId>,
    /// Optional native-side filter predicate. Not saved; systems installing
    /// a filter must reinstall it after a load.
    #[serde(skip)]
    filter: Option<CollisionFilter>,
    /// True once the engine side matches this logical state. Any mutation
    /// here resets it to false; the synchronization pass restores it.
    /// Deliberately not saved so a load re-applies everything.
    #[serde(skip)]
    state_applied: bool,
    /// Fixed-capacity record storage, allocated once.
    #[serde(skip)]
    records: Option<Box<[CollisionRecord]>>,
    /// Number of valid entries in `records` from the latest step.
    #[serde(skip)]
    active_count: usize,
}

impl CollisionManagement {
    /// Settings with recording disabled and nothing ignored.
    pub fn new() -> Self {
        Self {
            record_limit: 0,
            ignored: Vec::new(),
            filter: None,
            state_applied: false,
            records: None,
            active_count: 0,
        }
    }

    /// Enable collision recording with capacity for `max_records` contacts.
    ///
    /// Increase-only and idempotent: a lower or equal value than the current
    /// limit changes nothing. Recording can never be turned back off.
    pub fn start_recording(&mut self, max_records: u32) {
        if max_records <= self.record_limit {
            return;
        }
        self.record_limit = max_records;
        self.state_applied = false;
    }

    /// The current recording limit (zero when recording is disabled).
    pub fn record_limit(&self) -> u32 {
        self.record_limit
    }

    /// Suppress collisions between the owning entity and `other`.
    pub fn ignore_collisions_with(&mut self, other: EntityId) {
        if !self.ignored.contains(&other) {
            self.ignored.push(other);
            self.state_applied = false;
        }
    }

    /// Stop suppressing collisions with `other`.
    pub fn stop_ignoring(&mut self, other: EntityId) {
        if let Some(pos) = self.ignored.iter().position(|e| *e == other) {
            self.ignored.remove(pos);
            self.state_applied = false;
        }
    }

    /// The current deny-list.
    pub fn ignored(&self) -> &[EntityId] {
        &self.ignored
    }

    /// Install a filter predicate consulted before contacts register.
    pub fn set_filter(&mut self, filter: CollisionFilter) {
        self.filter = Some(filter);
        self.state_applied = false;
    }

    /// Remove the filter predicate.
    pub fn clear_filter(&mut self) {
        if self.filter.take().is_some() {
            self.state_applied = false;
        }
    }

    /// The installed filter, if any.
    pub fn filter(&self) -> Option<&CollisionFilter> {
        self.filter.as_ref()
    }

    /// Whether the engine side currently matches this logical state.
    pub fn is_state_applied(&self) -> bool {
        self.state_applied
    }

    /// Mark the engine side as synchronized. Called by the synchronization
    /// pass after pushing settings; allocates the record buffer on the first
    /// call that sees recording enabled.
    pub fn mark_state_applied(&mut self) {
        if self.records.is_none() && self.record_limit > 0 {
            self.records =
                Some(vec![CollisionRecord::EMPTY; self.record_limit as usize].into_boxed_slice());
        }
        self.state_applied = true;
    }

    /// Overwrite the buffer with this step's records. Extra records beyond
    /// the buffer capacity are dropped. No-op while recording is disabled or
    /// the buffer has not been allocated yet.
    pub fn write_records<I: IntoIterator<Item = CollisionRecord>>(&mut self, records: I) {
        let Some(buffer) = self.records.as_mut() else {
            self.active_count = 0;
            return;
        };
        let mut count = 0;
        for record in records {
            if count >= buffer.len() {
                break;
            }
            buffer[count] = record;
            count += 1;
        }
        self.active_count = count;
    }

    /// The records captured by the most recent physics step.
    ///
    /// Empty when recording was never started. Only meaningful between the
    /// end of a step and the start of the next one.
    pub fn active_collisions(&self) -> &[CollisionRecord] {
        match &self.records {
            Some(buffer) => &buffer[..self.active_count],
            None => &[],
        }
    }
}

impl Default for CollisionManagement {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CollisionManagement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollisionManagement")
            .field("record_limit", &self.record_limit)
            .field("ignored", &self.ignored)
            .field("has_filter", &self.filter.is_some())
            .field("state_applied", &self.state_applied)
            .field("active_count", &self.active_count)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
