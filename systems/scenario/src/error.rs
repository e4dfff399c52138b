use floorsim_core::Uv;
use thiserror::Error;

/// Inconsistencies detected while assembling activities, sequences and stations.
#[derive(Debug, Error, PartialEq)]
pub enum ScenarioError {
    /// The activity destination is not on a walkable cell.
    #[error("destination ({}, {}) of activity `{activity}` is not walkable", destination.x, destination.y)]
    UnreachableDestination {
        /// Activity whose destination was rejected.
        activity: String,
        /// Rejected destination.
        destination: Uv,
    },
    /// Two activities share a name.
    #[error("activity `{0}` is defined more than once")]
    DuplicateActivity(String),
    /// Two sequences share a name.
    #[error("sequence `{0}` is defined more than once")]
    DuplicateSequence(String),
    /// A sequence, station or trigger names an activity that does not exist.
    #[error("`{owner}` refers to unknown activity `{activity}`")]
    UnknownActivity {
        /// Sequence or station list holding the reference.
        owner: String,
        /// Missing activity name.
        activity: String,
    },
    /// A visual trigger names a sequence that does not exist.
    #[error("visual trigger refers to unknown sequence `{0}`")]
    UnknownSequence(String),
    /// A sequence has no activities.
    #[error("sequence `{0}` has no activities")]
    EmptySequence(String),
    /// A sequence activation interval is not a positive finite number.
    #[error("sequence `{name}` has invalid activation interval {lambda}")]
    InvalidActivationInterval {
        /// Offending sequence.
        name: String,
        /// Rejected interval.
        lambda: f64,
    },
    /// No main station was declared.
    #[error("at least one main station is required")]
    NoMainStation,
}
