#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the floor simulation engine.
//!
//! This crate defines the vocabulary that connects the cellular floor, the ray
//! and collision systems, and the agent motion system. Barrier geometry enters
//! through [`Barriers`], grid cells are addressed through [`Index`] and
//! [`GridFrame`], agents expose their kinematic snapshot as [`StateBase`], and
//! every observable state change is reported as an [`Event`] pushed into a
//! caller-owned buffer.

mod geometry;
mod grid;

pub use geometry::{BarrierPolygon, Barriers, ClosestPoint, Tolerance, Uv, UvLine};
pub use grid::{GridFrame, Index};

use serde::{Deserialize, Serialize};

/// Independent barrier classes with different semantic roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BarrierType {
    /// Barriers that occlude sight lines.
    Visual,
    /// Barriers that block bodies.
    Physical,
    /// Boundary of the walkable field.
    Field,
}

impl BarrierType {
    /// Every barrier class in storage order.
    pub const ALL: [BarrierType; 3] = [
        BarrierType::Visual,
        BarrierType::Physical,
        BarrierType::Field,
    ];

    /// Position of the class in per-class arrays.
    #[must_use]
    pub const fn slot(self) -> usize {
        match self {
            Self::Visual => 0,
            Self::Physical => 1,
            Self::Field => 2,
        }
    }

    /// Overlap state describing free space with respect to this class.
    ///
    /// Field barriers enclose the walkable area, so free cells are `Inside`.
    /// Visual and physical barriers are obstacles, so free cells are `Outside`.
    #[must_use]
    pub const fn clear_state(self) -> OverlapState {
        match self {
            Self::Field => OverlapState::Inside,
            Self::Visual | Self::Physical => OverlapState::Outside,
        }
    }

    /// Name of the distance field computed for this class.
    #[must_use]
    pub const fn distance_field_name(self) -> &'static str {
        match self {
            Self::Visual => "visual_barrier_distance",
            Self::Physical => "physical_barrier_distance",
            Self::Field => "edge_distance",
        }
    }
}

/// Classification of a cell relative to one barrier class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverlapState {
    /// The cell lies outside the polygons of the class.
    #[default]
    Outside,
    /// The cell lies inside the polygons of the class.
    Inside,
    /// At least one edge of the class crosses the cell.
    Overlap,
}

/// Unique identifier assigned to an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Minimal kinematic snapshot of an agent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateBase {
    /// Position on the floor.
    pub location: Uv,
    /// Unit facing direction.
    pub direction: Uv,
    /// Linear velocity.
    pub velocity: Uv,
}

impl StateBase {
    /// Creates a snapshot from its parts.
    #[must_use]
    pub const fn new(location: Uv, direction: Uv, velocity: Uv) -> Self {
        Self {
            location,
            direction,
            velocity,
        }
    }

    /// Creates a snapshot of an agent standing still.
    #[must_use]
    pub const fn at_rest(location: Uv, direction: Uv) -> Self {
        Self::new(location, direction, Uv::ZERO)
    }
}

/// What the agent is currently doing in its scripted schedule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngagementStatus {
    /// Idling towards a default station.
    #[default]
    Free,
    /// Standing still while performing a timed task.
    Engaged,
    /// Walking to the next activity of an activated sequence.
    WalkingInSequence,
}

/// Physical movement sub-mode, orthogonal to [`EngagementStatus`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementMode {
    /// Decelerate to rest and turn towards a target direction.
    StopAndOrient,
    /// Accelerate along the potential field gradient.
    #[default]
    Move,
}

/// Inclusive bounds, in seconds, of a randomly sampled engagement duration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngagementBounds {
    min: f64,
    max: f64,
}

impl EngagementBounds {
    /// Creates bounds, ordering the values and discarding negative durations.
    #[must_use]
    pub fn new(a: f64, b: f64) -> Self {
        let (min, max) = if a <= b { (a, b) } else { (b, a) };
        Self {
            min: min.max(0.0),
            max: max.max(0.0),
        }
    }

    /// Shortest engagement duration.
    #[must_use]
    pub const fn min(&self) -> f64 {
        self.min
    }

    /// Longest engagement duration.
    #[must_use]
    pub const fn max(&self) -> f64 {
        self.max
    }
}

/// Goal-seeking collaborator describing one activity an agent can perform.
///
/// Implementations own whatever potential field backs them; the agent only
/// needs the gradient direction, the scalar value, the rest pose and the
/// engagement bounds.
pub trait ActivityField: Send + Sync {
    /// Unique name of the activity.
    fn name(&self) -> &str;

    /// Unit direction of steepest descent at `location`, if defined there.
    fn direction(&self, location: Uv) -> Option<Uv>;

    /// Scalar potential at `location`, if the location is reachable.
    fn potential(&self, location: Uv) -> Option<f64>;

    /// Location and facing the agent settles into when performing the activity.
    fn default_state(&self) -> StateBase;

    /// Bounds of the engagement duration.
    fn engagement_bounds(&self) -> EngagementBounds;
}

/// Notifications emitted by agents after processing a timestep.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The engagement status of an agent changed.
    EngagementChanged {
        /// Agent whose status changed.
        agent: AgentId,
        /// Status before the transition.
        from: EngagementStatus,
        /// Status after the transition.
        to: EngagementStatus,
    },
    /// The movement mode of an agent changed.
    MovementModeChanged {
        /// Agent whose mode changed.
        agent: AgentId,
        /// Mode that became active.
        mode: MovementMode,
    },
    /// The agent started heading to a new activity.
    ActivityStarted {
        /// Agent that switched activity.
        agent: AgentId,
        /// Name of the activity.
        activity: String,
    },
    /// The agent started walking a sequence.
    SequenceStarted {
        /// Agent that picked up the sequence.
        agent: AgentId,
        /// Name of the sequence.
        sequence: String,
        /// Scheduled activation time of the task, in simulated seconds.
        activation_time: f64,
    },
    /// The agent finished the last activity of a sequence.
    SequenceCompleted {
        /// Agent that completed the sequence.
        agent: AgentId,
        /// Name of the sequence.
        sequence: String,
    },
    /// A visual trigger fired and queued its sequence.
    VisualTriggerFired {
        /// Agent that saw the target.
        agent: AgentId,
        /// Sequence promoted into the expected queue.
        sequence: String,
        /// Point that became visible.
        target: Uv,
    },
    /// The agent touched a barrier during a sub-step.
    Collided {
        /// Agent that collided.
        agent: AgentId,
        /// Contact location of the body centre.
        point: Uv,
        /// Contact normal pointing away from the barrier.
        normal: Uv,
        /// Index of the barrier edge that was hit.
        edge: usize,
    },
    /// An out-of-range observed timestep was replaced by the nominal step.
    TimeStepClamped {
        /// Agent that received the timestep.
        agent: AgentId,
        /// Timestep reported by the caller.
        observed: f64,
        /// Timestep that was simulated.
        applied: f64,
    },
}
