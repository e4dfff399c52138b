use std::fmt;

use floorsim_core::{BarrierType, StateBase, Uv};
use floorsim_floor::FloorGeometry;

use crate::is_visible;

/// Collaborator that decides whether an agent can currently see its target.
pub trait VisibilityTarget: Send + Sync + fmt::Debug {
    /// Returns the target point seen from `state`, if any.
    ///
    /// A point only counts when the cosine of the angle between the agent's
    /// facing direction and the direction to the point is at least
    /// `cosine_factor`.
    fn target_visibility_test(
        &self,
        state: &StateBase,
        cosine_factor: f64,
        geometry: &FloorGeometry,
    ) -> Option<Uv>;
}

/// Fixed set of target points checked in order.
#[derive(Clone, Debug, PartialEq)]
pub struct PointTargets {
    points: Vec<Uv>,
    barrier: BarrierType,
    max_distance: f64,
}

impl PointTargets {
    /// Creates targets occluded by visual barriers with unlimited range.
    #[must_use]
    pub fn new(points: Vec<Uv>) -> Self {
        Self {
            points,
            barrier: BarrierType::Visual,
            max_distance: f64::INFINITY,
        }
    }

    /// Limits the distance at which points can be seen.
    #[must_use]
    pub fn with_max_distance(mut self, max_distance: f64) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// Uses another barrier class for occlusion.
    #[must_use]
    pub fn with_barrier(mut self, barrier: BarrierType) -> Self {
        self.barrier = barrier;
        self
    }

    /// Target points.
    #[must_use]
    pub fn points(&self) -> &[Uv] {
        &self.points
    }
}

impl VisibilityTarget for PointTargets {
    fn target_visibility_test(
        &self,
        state: &StateBase,
        cosine_factor: f64,
        geometry: &FloorGeometry,
    ) -> Option<Uv> {
        let tolerance = geometry.tolerance().get();
        self.points.iter().copied().find(|&point| {
            let offset = point - state.location;
            let distance = offset.length();
            if distance > self.max_distance {
                return false;
            }
            if distance <= tolerance {
                return true;
            }
            state.direction.dot(offset / distance) >= cosine_factor
                && is_visible(geometry, state.location, point, self.barrier)
        })
    }
}
