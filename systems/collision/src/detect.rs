//! Continuous collision between a straight trajectory and buffered edges.

use floorsim_core::{Uv, UvLine};
use floorsim_floor::FloorGeometry;

use crate::CollisionAnalyzer;

/// Which part of the buffered edge was touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollisionKind {
    /// The body touched the edge line offset by the buffer radius.
    Line,
    /// The body touched the circle of buffer radius around an edge end point.
    EndPoint,
}

/// Earliest contact along a trajectory.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Collision {
    /// Location of the body centre at contact.
    pub point: Uv,
    /// Unit contact normal pointing away from the barrier.
    pub normal: Uv,
    /// Distance travelled along the trajectory before contact.
    pub length_to_collision: f64,
    /// Fraction of the trajectory left after contact, `1 - t`.
    pub time_step_remainder_proportion: f64,
    /// Index of the edge that was touched.
    pub edge: usize,
    /// Part of the edge that was touched.
    pub kind: CollisionKind,
}

impl Collision {
    /// Finds the earliest contact of a body of radius `buffer` moving in a
    /// straight line from `previous_location` to `current.location()`.
    ///
    /// The nearest edge of the previous query, the nearest edge of the current
    /// query and every other edge the current location already penetrates are
    /// tested both as offset lines and as end point circles. Contacts up to the
    /// floor tolerance outside the trajectory are accepted and clamped onto it.
    #[must_use]
    pub fn detect(
        geometry: &FloorGeometry,
        previous_location: Uv,
        previous: Option<&CollisionAnalyzer>,
        current: &CollisionAnalyzer,
        buffer: f64,
    ) -> Option<Self> {
        let tolerance = geometry.tolerance().get();
        let barrier = current.barrier();
        let trajectory = current.location() - previous_location;
        let length = trajectory.length();
        if length <= tolerance {
            return None;
        }

        let mut edges = Vec::with_capacity(4);
        if let Some(previous) = previous.filter(|previous| previous.barrier() == barrier) {
            edges.push(previous.edge());
        }
        if !edges.contains(&current.edge()) {
            edges.push(current.edge());
        }
        if let Some(cell) = geometry.cell_at(current.location()) {
            let lines = geometry.edges(barrier);
            for &edge in cell.buffer_edges(barrier) {
                let penetrating = lines
                    .get(edge)
                    .is_some_and(|line| line.distance_to(current.location()) <= buffer);
                if penetrating && !edges.contains(&edge) {
                    edges.push(edge);
                }
            }
        }

        let sweep = Sweep {
            start: previous_location,
            trajectory,
            length,
            slack: tolerance / length,
            buffer,
            tolerance,
        };
        let mut end_points: Vec<(Uv, usize)> = Vec::with_capacity(edges.len() * 2);
        let mut best: Option<Self> = None;

        for edge in edges {
            let Some(line) = geometry.edge(barrier, edge) else {
                continue;
            };
            best = earliest(best, sweep.against_line(line, edge));
            for point in [line.start, line.end] {
                if !end_points.iter().any(|(known, _)| *known == point) {
                    end_points.push((point, edge));
                }
            }
        }
        for (point, edge) in end_points {
            best = earliest(best, sweep.against_end_point(point, edge));
        }

        best
    }
}

fn earliest(best: Option<Collision>, candidate: Option<Collision>) -> Option<Collision> {
    match (best, candidate) {
        (Some(best), Some(candidate)) if candidate.length_to_collision < best.length_to_collision => {
            Some(candidate)
        }
        (None, candidate) => candidate,
        (best, _) => best,
    }
}

struct Sweep {
    start: Uv,
    trajectory: Uv,
    length: f64,
    slack: f64,
    buffer: f64,
    tolerance: f64,
}

impl Sweep {
    fn contact(&self, t: f64, normal: Uv, edge: usize, kind: CollisionKind) -> Option<Collision> {
        if t < -self.slack || t > 1.0 + self.slack {
            return None;
        }
        let t = t.clamp(0.0, 1.0);
        Some(Collision {
            point: self.start + self.trajectory * t,
            normal,
            length_to_collision: t * self.length,
            time_step_remainder_proportion: 1.0 - t,
            edge,
            kind,
        })
    }

    /// Crossing of the edge line offset by the buffer towards the start side.
    fn against_line(&self, line: UvLine, edge: usize) -> Option<Collision> {
        let normal = line.left_normal()?;
        let end = self.start + self.trajectory;
        let from = line.signed_distance(self.start);
        let to = line.signed_distance(end);
        if from == 0.0 {
            return None;
        }

        let side = from.signum();
        if side * (to - from) >= 0.0 {
            return None;
        }
        let t = if side * from <= self.buffer {
            0.0
        } else {
            (side * self.buffer - from) / (to - from)
        };

        let contact = self.contact(t, normal * side, edge, CollisionKind::Line)?;
        let direction = line.direction();
        let along = (contact.point - line.start).dot(direction) / direction.length_squared();
        let slack = self.tolerance / line.length();
        (along >= -slack && along <= 1.0 + slack).then_some(contact)
    }

    /// First entry into the buffer circle around an end point.
    fn against_end_point(&self, point: Uv, edge: usize) -> Option<Collision> {
        let relative = self.start - point;
        let a = self.trajectory.length_squared();
        let b = 2.0 * self.trajectory.dot(relative);
        let c = relative.length_squared() - self.buffer * self.buffer;

        let t = if c <= 0.0 {
            if b >= 0.0 {
                return None;
            }
            0.0
        } else {
            let discriminant = b * b - 4.0 * a * c;
            if discriminant < 0.0 {
                return None;
            }
            (-b - discriminant.sqrt()) / (2.0 * a)
        };

        let contact_point = self.start + self.trajectory * t.clamp(0.0, 1.0);
        let normal = (contact_point - point)
            .try_normalize()
            .unwrap_or(-self.trajectory / self.length);
        self.contact(t, normal, edge, CollisionKind::EndPoint)
    }
}
