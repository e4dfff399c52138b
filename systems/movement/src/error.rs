use floorsim_core::{AgentId, Uv};
use thiserror::Error;

/// Fatal faults raised while advancing an agent.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum MotionError {
    /// The body penetrated a barrier but no contact was found along the step.
    #[error(
        "no collision found at ({}, {}) moving at ({}, {}) towards edge {edge}",
        location.x, location.y, velocity.x, velocity.y
    )]
    MissingCollision {
        /// Location at the start of the failed sub-step.
        location: Uv,
        /// Velocity during the failed sub-step.
        velocity: Uv,
        /// Edge the body penetrated.
        edge: usize,
    },
    /// A sequence names an activity the catalog does not know.
    #[error("activity `{name}` is not defined")]
    MissingActivity {
        /// Name that failed to resolve.
        name: String,
    },
    /// The body moved off the grid.
    #[error("agent left the floor at ({}, {})", location.x, location.y)]
    LeftFloor {
        /// Location outside the grid.
        location: Uv,
    },
    /// No main station could be resolved for a free agent.
    #[error("no main station is available")]
    NoStation,
    /// The agent was stopped by an earlier fault.
    #[error("agent {} is halted", agent.get())]
    Halted {
        /// Halted agent.
        agent: AgentId,
    },
}
