//! Typed component records.
//!
//! An entity is a stable identifier plus a sparse set of these records;
//! systems decide what to do with an entity by checking record presence,
//! never by downcasting. All records here are logical state: they serialize
//! for saves, and anything tied to the physics backend is reconstructed from
//! them on load.

use serde::{Deserialize, Serialize};

use crate::math::Vec2;
use crate::EntityError;

// ---------------------------------------------------------------------------
// TimedLife
// ---------------------------------------------------------------------------

/// Countdown-driven despawning.
///
/// The expiry system decrements `time_to_live` once per logic step. When it
/// reaches zero the entity is either destroyed outright or, if a fade was
/// declared, marked dead immediately while its removal waits for the fade
/// countdown to finish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedLife {
    /// Seconds of life remaining before expiry triggers.
    pub time_to_live: f32,
    /// Declared fade duration, consumed when the expiry fires. May be set at
    /// most once over the record's lifetime.
    fade_time: Option<f32>,
    /// Remaining fade countdown once fading has started.
    fade_remaining: Option<f32>,
}

impl TimedLife {
    /// A lifetime of `time_to_live` seconds with no fade: expiry destroys
    /// the entity immediately.
    pub fn new(time_to_live: f32) -> Self {
        Self {
            time_to_live,
            fade_time: None,
            fade_remaining: None,
        }
    }

    /// A lifetime with a fade: at expiry the entity goes logically dead and
    /// lingers for `fade` more seconds before removal.
    pub fn with_fade(time_to_live: f32, fade: f32) -> Self {
        Self {
            time_to_live,
            fade_time: Some(fade),
            fade_remaining: None,
        }
    }

    /// Declare a fade duration after construction.
    ///
    /// Fails with [`EntityError::FadeAlreadyDeclared`] if a fade was already
    /// declared or has already started; a silent overwrite here would let an
    /// already-dying entity extend its own removal indefinitely.
    pub fn set_fade_time(&mut self, fade: f32) -> Result<(), EntityError> {
        if self.fade_time.is_some() || self.fade_remaining.is_some() {
            return Err(EntityError::FadeAlreadyDeclared);
        }
        self.fade_time = Some(fade);
        Ok(())
    }

    /// Whether a fade has been declared (started or not).
    pub fn has_fade(&self) -> bool {
        self.fade_time.is_some() || self.fade_remaining.is_some()
    }

    /// Whether the fade countdown is currently running.
    pub fn is_fading(&self) -> bool {
        self.fade_remaining.is_some()
    }

    /// Start the declared fade, moving it into the running countdown.
    /// Returns `false` when no fade was declared.
    pub fn begin_fade(&mut self) -> bool {
        match self.fade_time.take() {
            Some(fade) if fade > 0.0 => {
                self.fade_remaining = Some(fade);
                true
            }
            Some(_) => false,
            None => false,
        }
    }

    /// Advance a running fade. Returns `true` when the fade just finished.
    pub fn tick_fade(&mut self, delta: f32) -> bool {
        if let Some(remaining) = self.fade_remaining.as_mut() {
            *remaining -= delta;
            if *remaining <= 0.0 {
                return true;
            }
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Compounds / Processor
// ---------------------------------------------------------------------------

/// Identifier of a compound kind. The kernel does not interpret these; the
/// surrounding game defines the vocabulary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CompoundId(pub u16);

/// Bounded per-compound storage.
///
/// Amounts are kept in a sorted map so iteration order is reproducible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compounds {
    stored: std::collections::BTreeMap<CompoundId, f32>,
    /// Per-compound storage cap.
    pub capacity: f32,
}

impl Compounds {
    /// Empty storage with the given per-compound capacity.
    pub fn new(capacity: f32) -> Self {
        Self {
            stored: std::collections::BTreeMap::new(),
            capacity,
        }
    }

    /// Current amount of a compound (zero when absent).
    pub fn amount(&self, compound: CompoundId) -> f32 {
        self.stored.get(&compound).copied().unwrap_or(0.0)
    }

    /// Add up to `amount`, clamped by capacity. Returns what was accepted.
    pub fn add(&mut self, compound: CompoundId, amount: f32) -> f32 {
        if amount <= 0.0 {
            return 0.0;
        }
        let current = self.amount(compound);
        let accepted = amount.min(self.capacity - current).max(0.0);
        if accepted > 0.0 {
            self.stored.insert(compound, current + accepted);
        }
        accepted
    }

    /// Take up to `amount`. Returns what was actually available.
    pub fn take(&mut self, compound: CompoundId, amount: f32) -> f32 {
        if amount <= 0.0 {
            return 0.0;
        }
        let current = self.amount(compound);
        let taken = amount.min(current);
        let left = current - taken;
        if left > 0.0 {
            self.stored.insert(compound, left);
        } else {
            self.stored.remove(&compound);
        }
        taken
    }

    /// Total stored across all compounds.
    pub fn total(&self) -> f32 {
        self.stored.values().sum()
    }

    /// Iterate `(compound, amount)` pairs in compound order.
    pub fn iter(&self) -> impl Iterator<Item = (CompoundId, f32)> + '_ {
        self.stored.iter().map(|(id, amount)| (*id, *amount))
    }
}

/// One conversion rule: consume `input`, produce `output` scaled by `ratio`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    /// Compound consumed.
    pub input: CompoundId,
    /// Compound produced.
    pub output: CompoundId,
    /// Input units consumed per second at full speed.
    pub rate: f32,
    /// Output units produced per input unit consumed.
    pub ratio: f32,
}

/// The set of conversions an entity runs each logic step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Processor {
    /// Conversions applied in order.
    pub conversions: Vec<Conversion>,
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// Movement plan computed for an agent in the parallel phase and applied in
/// the sequential phase of the same step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentPlan {
    /// Velocity the agent wants this step.
    pub target_velocity: Vec2,
    /// Heading the agent wants to face, radians.
    pub target_rotation: f32,
}

/// Autonomous behaviour state.
///
/// The parallel agent system writes [`plan`](Self::plan) during its
/// read-mostly phase; nothing else touches that field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Seconds between fresh decisions; between decisions the previous plan
    /// is reused.
    pub decision_interval: f32,
    /// Time since the last fresh decision.
    pub since_decision: f32,
    /// Preferred travel speed, units per second.
    pub cruise_speed: f32,
    /// The plan computed this step, if any.
    pub plan: Option<AgentPlan>,
}

impl Agent {
    /// An agent that re-decides every `decision_interval` seconds and travels
    /// at `cruise_speed`.
    pub fn new(decision_interval: f32, cruise_speed: f32) -> Self {
        Self {
            decision_interval,
            since_decision: decision_interval,
            cruise_speed,
            plan: None,
        }
    }
}

// ---------------------------------------------------------------------------
// BodySpec
// ---------------------------------------------------------------------------

/// Collision shape description. Logical: the physics bridge turns this into
/// backend shapes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ShapeSpec {
    /// Circle with the given radius.
    Ball {
        /// Radius of the ball.
        radius: f32,
    },
    /// Axis-aligned box with half-extents.
    Cuboid {
        /// Half-width along x.
        half_width: f32,
        /// Half-height along y.
        half_height: f32,
    },
}

/// How the physics engine should treat the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    /// Fully simulated.
    Moving,
    /// Immovable.
    Fixed,
}

/// The logical description from which an entity's physics body is created --
/// and recreated on load. Native handles themselves never serialize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodySpec {
    /// Collision shape.
    pub shape: ShapeSpec,
    /// Body kind.
    pub kind: BodyKind,
    /// Prevent the solver from spinning the body. The equivalent of the
    /// original axis-lock used to keep cells upright in their plane.
    pub lock_rotation: bool,
}

impl BodySpec {
    /// A moving body with the given shape, rotation free.
    pub fn moving(shape: ShapeSpec) -> Self {
        Self {
            shape,
            kind: BodyKind::Moving,
            lock_rotation: false,
        }
    }

    /// A fixed body with the given shape.
    pub fn fixed(shape: ShapeSpec) -> Self {
        Self {
            shape,
            kind: BodyKind::Fixed,
            lock_rotation: false,
        }
    }

    /// Lock the body's rotation.
    pub fn with_locked_rotation(mut self) -> Self {
        self.lock_rotation = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_can_only_be_declared_once() {
        let mut timed = TimedLife::new(1.0);
        timed.set_fade_time(0.5).unwrap();
        assert!(matches!(
            timed.set_fade_time(0.7),
            Err(EntityError::FadeAlreadyDeclared)
        ));
    }

    #[test]
    fn fade_cannot_be_declared_while_fading() {
        let mut timed = TimedLife::with_fade(1.0, 0.5);
        assert!(timed.begin_fade());
        assert!(timed.is_fading());
        assert!(timed.set_fade_time(2.0).is_err());
    }

    #[test]
    fn begin_fade_without_declaration_is_false() {
        let mut timed = TimedLife::new(1.0);
        assert!(!timed.begin_fade());
        assert!(!timed.is_fading());
    }

    #[test]
    fn zero_fade_counts_as_no_fade() {
        let mut timed = TimedLife::with_fade(1.0, 0.0);
        assert!(!timed.begin_fade());
    }

    #[test]
    fn tick_fade_reports_completion() {
        let mut timed = TimedLife::with_fade(1.0, 0.5);
        timed.begin_fade();
        assert!(!timed.tick_fade(0.3));
        assert!(timed.tick_fade(0.3));
    }

    #[test]
    fn compounds_respect_capacity() {
        let mut c = Compounds::new(10.0);
        let glucose = CompoundId(1);
        assert_eq!(c.add(glucose, 6.0), 6.0);
        assert_eq!(c.add(glucose, 6.0), 4.0);
        assert_eq!(c.amount(glucose), 10.0);
    }

    #[test]
    fn compounds_take_is_bounded_by_stored() {
        let mut c = Compounds::new(10.0);
        let iron = CompoundId(2);
        c.add(iron, 3.0);
        assert_eq!(c.take(iron, 5.0), 3.0);
        assert_eq!(c.amount(iron), 0.0);
    }

    #[test]
    fn compounds_iteration_is_sorted() {
        let mut c = Compounds::new(100.0);
        c.add(CompoundId(5), 1.0);
        c.add(CompoundId(1), 1.0);
        c.add(CompoundId(3), 1.0);
        let ids: Vec<u16> = c.iter().map(|(id, _)| id.0).collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }

    #[test]
    fn body_spec_builders() {
        let spec = BodySpec::moving(ShapeSpec::Ball { radius: 1.0 }).with_locked_rotation();
        assert_eq!(spec.kind, BodyKind::Moving);
        assert!(spec.lock_rotation);
    }
}
