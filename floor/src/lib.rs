#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Cellular floor: a uniform grid spatial index over polygonal barriers.
//!
//! [`FloorGeometry`] fits a grid around the barrier input, registers every
//! barrier edge in the cells its segment crosses and classifies each cell as
//! inside, outside or overlapping for the visual, physical and field classes.
//! [`CellularFloor`] adds a distance-to-nearest-edge field per class, computed
//! with a multi-source wavefront. [`GridRay`] walks the cells crossed by a ray
//! and is the building block of edge registration, visibility and collision
//! queries.

mod cell;
mod distance;
mod error;
mod geometry;
mod ray;
mod spatial_data;

pub use cell::Cell;
pub use distance::CellularFloor;
pub use error::{FloorError, RayError};
pub use geometry::{EdgeAddress, FloorGeometry};
pub use ray::{GridRay, GridRaySteps, RayStep};
pub use spatial_data::{SpatialDataField, SpatialDataRegistry};
