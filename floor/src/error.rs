use floorsim_core::{BarrierType, Uv};
use thiserror::Error;

/// Failures raised while building a floor from barrier geometry.
///
/// Every variant is fatal for the floor instance being built: the distance
/// fields and all downstream queries depend on a correct classification.
#[derive(Debug, Error, PartialEq)]
pub enum FloorError {
    /// The requested cell size is zero, negative or not finite.
    #[error("cell size must be positive and finite, got {0}")]
    NonPositiveCellSize(f64),
    /// No barrier points were supplied, so the grid bounds are undefined.
    #[error("barrier geometry is empty")]
    EmptyGeometry,
    /// A polygon has fewer than two points.
    #[error("{barrier:?} polygon {polygon} has fewer than two points")]
    DegeneratePolygon {
        /// Class of the offending polygon.
        barrier: BarrierType,
        /// Position of the polygon within its class.
        polygon: usize,
    },
    /// An edge is shorter than the geometric tolerance.
    #[error("{barrier:?} polygon {polygon} has a zero-length edge starting at point {point}")]
    ZeroLengthEdge {
        /// Class of the offending polygon.
        barrier: BarrierType,
        /// Position of the polygon within its class.
        polygon: usize,
        /// Index of the edge's start vertex.
        point: usize,
    },
    /// The walkable seed point does not fall on the grid.
    #[error("seed point ({}, {}) lies outside the grid", seed.x, seed.y)]
    SeedOutsideGrid {
        /// Seed point that was supplied.
        seed: Uv,
    },
    /// The walkable seed point falls in a cell crossed by a barrier edge.
    #[error("seed point ({}, {}) lies in a cell crossed by a {barrier:?} barrier", seed.x, seed.y)]
    SeedOnBarrier {
        /// Class whose edge crosses the seed cell.
        barrier: BarrierType,
        /// Seed point that was supplied.
        seed: Uv,
    },
    /// A barrier edge could not be traversed across the grid.
    #[error(transparent)]
    Ray(#[from] RayError),
}

/// Failures raised while constructing a grid ray.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum RayError {
    /// The direction vector has no length.
    #[error("ray direction has zero length")]
    ZeroDirection,
}
