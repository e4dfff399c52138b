//! Planar geometry primitives shared by the floor, ray and collision code.

use serde::{Deserialize, Serialize};

/// Two dimensional vector used both as a point and as a direction.
///
/// `u` maps to `x` and `v` maps to `y`.
pub type Uv = glam::DVec2;

/// Absolute geometric tolerance threaded through every floor query.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tolerance(f64);

impl Tolerance {
    /// Tolerance applied when no explicit value is configured.
    pub const DEFAULT: Self = Self(1e-6);

    /// Creates a tolerance from the provided absolute distance.
    ///
    /// Negative values are mirrored so the tolerance is never negative.
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self(value.abs())
    }

    /// Absolute distance represented by the tolerance.
    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Straight segment between two points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UvLine {
    /// First point of the segment.
    pub start: Uv,
    /// Second point of the segment.
    pub end: Uv,
}

/// Point on a segment closest to a query point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClosestPoint {
    /// Location of the closest point.
    pub point: Uv,
    /// Normalised position of the point along the segment, in `0.0..=1.0`.
    pub parameter: f64,
    /// Whether the closest point coincides with one of the segment ends.
    pub is_end_point: bool,
}

impl UvLine {
    /// Creates a segment from two points.
    #[must_use]
    pub const fn new(start: Uv, end: Uv) -> Self {
        Self { start, end }
    }

    /// Vector from `start` to `end`.
    #[must_use]
    pub fn direction(&self) -> Uv {
        self.end - self.start
    }

    /// Euclidean length of the segment.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.direction().length()
    }

    /// Midpoint of the segment.
    #[must_use]
    pub fn midpoint(&self) -> Uv {
        (self.start + self.end) * 0.5
    }

    /// Reports whether the segment is shorter than the tolerance.
    #[must_use]
    pub fn is_degenerate(&self, tolerance: Tolerance) -> bool {
        self.length() <= tolerance.get()
    }

    /// Unit normal on the left of the travel direction, if the segment has length.
    #[must_use]
    pub fn left_normal(&self) -> Option<Uv> {
        self.direction().try_normalize().map(|direction| direction.perp())
    }

    /// Finds the point on the segment closest to `point`.
    ///
    /// The closest point is flagged as an end point when it lies within the
    /// tolerance of either end of the segment.
    #[must_use]
    pub fn closest_point(&self, point: Uv, tolerance: Tolerance) -> ClosestPoint {
        let direction = self.direction();
        let length_squared = direction.length_squared();
        if length_squared == 0.0 {
            return ClosestPoint {
                point: self.start,
                parameter: 0.0,
                is_end_point: true,
            };
        }

        let parameter = ((point - self.start).dot(direction) / length_squared).clamp(0.0, 1.0);
        let closest = self.start + direction * parameter;
        let is_end_point = closest.distance(self.start) <= tolerance.get()
            || closest.distance(self.end) <= tolerance.get();

        ClosestPoint {
            point: closest,
            parameter,
            is_end_point,
        }
    }

    /// Squared distance between `point` and the segment.
    #[must_use]
    pub fn distance_squared_to(&self, point: Uv) -> f64 {
        let closest = self.closest_point(point, Tolerance::DEFAULT);
        closest.point.distance_squared(point)
    }

    /// Distance between `point` and the segment.
    #[must_use]
    pub fn distance_to(&self, point: Uv) -> f64 {
        self.distance_squared_to(point).sqrt()
    }

    /// Signed distance of `point` from the infinite line through the segment.
    ///
    /// Positive values lie on the left of the travel direction. Degenerate
    /// segments report zero.
    #[must_use]
    pub fn signed_distance(&self, point: Uv) -> f64 {
        self.left_normal()
            .map_or(0.0, |normal| (point - self.start).dot(normal))
    }
}

/// Ordered ring (or open chain) of points describing one barrier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BarrierPolygon {
    /// Vertices in drawing order.
    pub points: Vec<Uv>,
    /// Whether the last vertex connects back to the first.
    #[serde(default = "closed_by_default")]
    pub closed: bool,
}

fn closed_by_default() -> bool {
    true
}

impl BarrierPolygon {
    /// Creates a closed polygon from its vertices.
    #[must_use]
    pub fn closed(points: Vec<Uv>) -> Self {
        Self {
            points,
            closed: true,
        }
    }

    /// Creates an open polyline from its vertices.
    #[must_use]
    pub fn open(points: Vec<Uv>) -> Self {
        Self {
            points,
            closed: false,
        }
    }

    /// Creates the closed axis-aligned rectangle spanning two corners.
    #[must_use]
    pub fn rectangle(min: Uv, max: Uv) -> Self {
        Self::closed(vec![
            min,
            Uv::new(max.x, min.y),
            max,
            Uv::new(min.x, max.y),
        ])
    }

    /// Iterates the polygon edges together with the index of their start vertex.
    pub fn edges(&self) -> impl Iterator<Item = (usize, UvLine)> + '_ {
        let count = self.points.len();
        let edge_count = match (count, self.closed) {
            (0 | 1, _) => 0,
            (2, _) => 1,
            (_, true) => count,
            (_, false) => count - 1,
        };

        (0..edge_count).map(move |index| {
            let start = self.points[index];
            let end = self.points[(index + 1) % count];
            (index, UvLine::new(start, end))
        })
    }
}

/// Barrier polygons partitioned into the three independent barrier classes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Barriers {
    /// Polygons that block sight lines.
    #[serde(default)]
    pub visual: Vec<BarrierPolygon>,
    /// Polygons that block bodies.
    #[serde(default)]
    pub physical: Vec<BarrierPolygon>,
    /// Polygons bounding the walkable field.
    #[serde(default)]
    pub field: Vec<BarrierPolygon>,
}

impl Barriers {
    /// Polygons registered for the requested class.
    #[must_use]
    pub fn polygons(&self, barrier: crate::BarrierType) -> &[BarrierPolygon] {
        match barrier {
            crate::BarrierType::Visual => &self.visual,
            crate::BarrierType::Physical => &self.physical,
            crate::BarrierType::Field => &self.field,
        }
    }

    /// Iterates every vertex of every class.
    pub fn all_points(&self) -> impl Iterator<Item = Uv> + '_ {
        self.visual
            .iter()
            .chain(&self.physical)
            .chain(&self.field)
            .flat_map(|polygon| polygon.points.iter().copied())
    }
}
