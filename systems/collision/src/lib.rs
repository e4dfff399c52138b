#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Nearest-barrier queries and continuous collision detection for circular
//! bodies moving across the cellular floor.

mod detect;

pub use detect::{Collision, CollisionKind};

use floorsim_core::{BarrierType, Uv, UvLine};
use floorsim_floor::FloorGeometry;

/// Nearest barrier edge around a point.
///
/// The query scans the buffer edges of the point's cell, which cover the
/// clamped 3x3 block of cells around it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionAnalyzer {
    location: Uv,
    barrier: BarrierType,
    edge: usize,
    line: UvLine,
    closest_point: Uv,
    is_closest_point_an_end_point: bool,
    distance: f64,
    normal: Uv,
}

impl CollisionAnalyzer {
    /// Finds the edge of the class nearest to `location`.
    ///
    /// Returns `None` when the point is off the grid or no edge of the class is
    /// registered around its cell.
    #[must_use]
    pub fn get(geometry: &FloorGeometry, location: Uv, barrier: BarrierType) -> Option<Self> {
        let tolerance = geometry.tolerance();
        let cell = geometry.cell_at(location)?;
        let lines = geometry.edges(barrier);

        let (edge, line, closest) = cell
            .buffer_edges(barrier)
            .iter()
            .filter_map(|&edge| {
                lines
                    .get(edge)
                    .map(|line| (edge, *line, line.closest_point(location, tolerance)))
            })
            .min_by(|a, b| {
                a.2.point
                    .distance_squared(location)
                    .total_cmp(&b.2.point.distance_squared(location))
            })?;

        let offset = location - closest.point;
        let distance = offset.length();
        let normal = if distance > tolerance.get() {
            offset / distance
        } else {
            line.left_normal().unwrap_or(Uv::ZERO)
        };

        Some(Self {
            location,
            barrier,
            edge,
            line,
            closest_point: closest.point,
            is_closest_point_an_end_point: closest.is_end_point,
            distance,
            normal,
        })
    }

    /// Point the query was made for.
    #[must_use]
    pub const fn location(&self) -> Uv {
        self.location
    }

    /// Barrier class that was queried.
    #[must_use]
    pub const fn barrier(&self) -> BarrierType {
        self.barrier
    }

    /// Index of the nearest edge.
    #[must_use]
    pub const fn edge(&self) -> usize {
        self.edge
    }

    /// Segment of the nearest edge.
    #[must_use]
    pub const fn line(&self) -> UvLine {
        self.line
    }

    /// Point on the nearest edge closest to the query location.
    #[must_use]
    pub const fn closest_point(&self) -> Uv {
        self.closest_point
    }

    /// Whether the closest point is one of the edge's end points.
    #[must_use]
    pub const fn is_closest_point_an_end_point(&self) -> bool {
        self.is_closest_point_an_end_point
    }

    /// Distance from the query location to the closest point.
    #[must_use]
    pub const fn distance(&self) -> f64 {
        self.distance
    }

    /// Unit vector from the closest point towards the query location.
    ///
    /// When the location lies on the edge, the edge's left normal is used.
    #[must_use]
    pub const fn normal(&self) -> Uv {
        self.normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use floorsim_core::{BarrierPolygon, Barriers, Tolerance};

    fn room() -> FloorGeometry {
        let outer = BarrierPolygon::rectangle(Uv::ZERO, Uv::new(8.0, 8.0));
        let barriers = Barriers {
            physical: vec![outer.clone()],
            field: vec![outer],
            ..Barriers::default()
        };
        FloorGeometry::new(1.0, &barriers, Uv::new(4.0, 4.0), Tolerance::DEFAULT)
            .expect("valid room")
    }

    #[test]
    fn point_on_edge_end_point_reports_zero_distance() {
        let floor = room();
        let analyzer = CollisionAnalyzer::get(&floor, Uv::new(8.0, 0.0), BarrierType::Field)
            .expect("corner is next to edges");

        assert!(analyzer.is_closest_point_an_end_point());
        assert_eq!(analyzer.distance(), 0.0);
        assert!(analyzer.edge() == 0 || analyzer.edge() == 1);
        assert_eq!(analyzer.closest_point(), Uv::new(8.0, 0.0));
    }

    #[test]
    fn normal_points_away_from_the_wall() {
        let floor = room();
        let analyzer = CollisionAnalyzer::get(&floor, Uv::new(0.6, 4.2), BarrierType::Physical)
            .expect("wall in range");

        assert_eq!(analyzer.edge(), 3);
        assert!((analyzer.distance() - 0.6).abs() < 1e-12);
        assert!(analyzer.normal().distance(Uv::new(1.0, 0.0)) < 1e-12);
        assert!(!analyzer.is_closest_point_an_end_point());
    }

    #[test]
    fn open_floor_has_no_nearby_barrier() {
        let floor = room();
        assert!(CollisionAnalyzer::get(&floor, Uv::new(4.0, 4.0), BarrierType::Physical).is_none());
        assert!(CollisionAnalyzer::get(&floor, Uv::new(40.0, 4.0), BarrierType::Physical).is_none());
    }
}
