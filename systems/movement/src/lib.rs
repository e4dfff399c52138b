#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Agent motion over the cellular floor.
//!
//! Every [`Agent`] runs a small task state machine (free, walking a sequence,
//! engaged) and a physics update: acceleration along the gradient of its
//! current activity, repulsion from barriers in front of it, braking in the
//! stop-and-orient mode, continuous collision with elastic and frictional
//! response, and capped turning. [`Simulation`] advances many agents over one
//! shared floor in parallel.

mod agent;
mod config;
mod error;
mod physics;
mod simulation;

pub use agent::{Agent, AgentSnapshot};
pub use config::{Integration, MotionConfig, RepulsionCurve};
pub use error::MotionError;
pub use simulation::{Simulation, StepReport};
