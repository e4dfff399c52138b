#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Activities, sequences and per-agent task queues.
//!
//! An [`Activity`] is a destination with a walking-distance [`PotentialField`]
//! and engagement bounds. [`Sequence`]s chain activities and are activated at
//! random times drawn per interval; the [`Catalog`] holds the shared
//! definitions and every agent owns a [`Scenario`] with its expected task queue
//! and the [`VisualTrigger`]s it has not fired yet.

mod activity;
mod catalog;
mod error;
mod potential;
mod scenario;
mod sequence;

pub use activity::Activity;
pub use catalog::{Catalog, VisualTrigger};
pub use error::ScenarioError;
pub use potential::PotentialField;
pub use scenario::{Scenario, Task};
pub use sequence::Sequence;
