#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Line-of-sight queries over the cellular floor.
//!
//! Every query marches a [`GridRay`] across the grid and only tests the edges
//! registered in cells that overlap the requested barrier class.

mod target;

pub use target::{PointTargets, VisibilityTarget};

use floorsim_core::{BarrierType, OverlapState, Uv, UvLine};
use floorsim_floor::{FloorGeometry, GridRay};
use rayon::prelude::*;

/// Nearest barrier hit along a ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Intersection point.
    pub point: Uv,
    /// Distance from the ray origin to the intersection.
    pub distance: f64,
    /// Index of the edge that was hit.
    pub edge: usize,
}

/// Distance along a unit `direction` from `origin` to `edge`.
///
/// The edge end points are classified by the sign of their cross product with
/// the direction. Opposite signs (or an end point exactly on the ray) yield the
/// interpolated crossing; a collinear edge yields its nearest end point ahead,
/// or zero when it covers the origin. Crossings behind the origin are dropped.
#[must_use]
pub fn distance_to(origin: Uv, direction: Uv, edge: UvLine) -> Option<f64> {
    let to_start = edge.start - origin;
    let to_end = edge.end - origin;
    let side_start = direction.perp_dot(to_start);
    let side_end = direction.perp_dot(to_end);

    if side_start == 0.0 && side_end == 0.0 {
        let along_start = to_start.dot(direction);
        let along_end = to_end.dot(direction);
        let (near, far) = if along_start <= along_end {
            (along_start, along_end)
        } else {
            (along_end, along_start)
        };
        return if near <= 0.0 && far >= 0.0 {
            Some(0.0)
        } else if near > 0.0 {
            Some(near)
        } else {
            None
        };
    }

    if side_start * side_end > 0.0 {
        return None;
    }

    let fraction = side_start / (side_start - side_end);
    let crossing = edge.start + edge.direction() * fraction;
    let distance = (crossing - origin).dot(direction);
    (distance >= 0.0).then_some(distance)
}

/// Reports whether no edge of the class blocks the segment from `from` to `to`.
///
/// Crossings within the floor tolerance of either end point are ignored, which
/// keeps the test symmetric in its two arguments.
#[must_use]
pub fn is_visible(geometry: &FloorGeometry, from: Uv, to: Uv, barrier: BarrierType) -> bool {
    let tolerance = geometry.tolerance().get();
    let offset = to - from;
    let length = offset.length();
    if length <= tolerance {
        return true;
    }
    let direction = offset / length;
    let Ok(ray) = GridRay::new(from, direction, *geometry.frame(), Some(length)) else {
        return true;
    };
    let edges = geometry.edges(barrier);

    for step in ray.steps() {
        let Some(cell) = geometry.find_cell(step.index) else {
            continue;
        };
        if cell.overlap(barrier) != OverlapState::Overlap {
            continue;
        }
        for &edge in cell.edges(barrier) {
            let Some(line) = edges.get(edge) else {
                continue;
            };
            if let Some(distance) = distance_to(from, direction, *line) {
                if distance > tolerance && distance < length - tolerance {
                    return false;
                }
            }
        }
    }

    true
}

/// Nearest edge of the class hit by a ray running until it leaves the grid.
///
/// Hits closer than the floor tolerance are ignored. A zero direction never
/// hits anything.
#[must_use]
pub fn ray_intersection(
    geometry: &FloorGeometry,
    origin: Uv,
    direction: Uv,
    barrier: BarrierType,
) -> Option<RayHit> {
    nearest_hit(geometry, origin, direction, barrier, None)
}

fn nearest_hit(
    geometry: &FloorGeometry,
    origin: Uv,
    direction: Uv,
    barrier: BarrierType,
    skip: Option<usize>,
) -> Option<RayHit> {
    let tolerance = geometry.tolerance().get();
    let ray = geometry.ray(origin, direction, None).ok()?;
    let direction = ray.direction();
    let edges = geometry.edges(barrier);
    let mut best: Option<RayHit> = None;

    for step in ray.steps() {
        let Some(cell) = geometry.find_cell(step.index) else {
            continue;
        };
        if cell.overlap(barrier) != OverlapState::Overlap {
            continue;
        }
        for &edge in cell.edges(barrier) {
            if skip == Some(edge) {
                continue;
            }
            let Some(distance) = edges
                .get(edge)
                .and_then(|line| distance_to(origin, direction, *line))
            else {
                continue;
            };
            if distance <= tolerance || best.is_some_and(|hit| hit.distance <= distance) {
                continue;
            }
            best = Some(RayHit {
                point: origin + direction * distance,
                distance,
                edge,
            });
        }
    }

    best
}

/// Follows a ray as it reflects off edges of the class.
///
/// The returned polyline starts at `origin`, contains up to `max_bounces`
/// reflection points and ends at the next hit or where the ray leaves the grid.
#[must_use]
pub fn trace_bounces(
    geometry: &FloorGeometry,
    origin: Uv,
    direction: Uv,
    barrier: BarrierType,
    max_bounces: usize,
) -> Vec<Uv> {
    let mut path = vec![origin];
    let Some(mut direction) = direction.try_normalize() else {
        return path;
    };
    let mut position = origin;
    let mut skip = None;

    for _ in 0..max_bounces {
        let Some(hit) = nearest_hit(geometry, position, direction, barrier, skip) else {
            break;
        };
        let Some(normal) = geometry
            .edge(barrier, hit.edge)
            .and_then(|line| line.left_normal())
        else {
            break;
        };
        path.push(hit.point);
        direction -= normal * (2.0 * direction.dot(normal));
        position = hit.point;
        skip = Some(hit.edge);
    }

    match nearest_hit(geometry, position, direction, barrier, skip) {
        Some(hit) => path.push(hit.point),
        None => {
            if let Ok(ray) = geometry.ray(position, direction, None) {
                path.push(ray.point_at(ray.end()));
            }
        }
    }

    path
}

/// Ids of the walkable cells whose centres are visible from `vantage` within
/// `depth`, in increasing order.
#[must_use]
pub fn isovist(
    geometry: &FloorGeometry,
    vantage: Uv,
    barrier: BarrierType,
    depth: f64,
) -> Vec<usize> {
    let min = geometry.territory_min();
    let max = geometry.territory_max();

    geometry
        .cells()
        .par_iter()
        .filter(|cell| {
            let center = cell.center();
            cell.overlap(BarrierType::Field) != OverlapState::Outside
                && center.cmpge(min).all()
                && center.cmple(max).all()
                && center.distance(vantage) <= depth
                && is_visible(geometry, vantage, center, barrier)
        })
        .map(|cell| cell.id())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall() -> UvLine {
        UvLine::new(Uv::new(2.0, -1.0), Uv::new(2.0, 1.0))
    }

    #[test]
    fn crossing_edge_reports_exact_distance() {
        let distance = distance_to(Uv::ZERO, Uv::new(1.0, 0.0), wall()).expect("hit");
        assert!((distance - 2.0).abs() < 1e-12);
    }

    #[test]
    fn edge_behind_origin_is_ignored() {
        assert_eq!(distance_to(Uv::ZERO, Uv::new(-1.0, 0.0), wall()), None);
    }

    #[test]
    fn edge_to_one_side_is_missed() {
        assert_eq!(distance_to(Uv::ZERO, Uv::new(0.0, 1.0), wall()), None);
    }

    #[test]
    fn end_point_on_ray_counts_as_hit() {
        let edge = UvLine::new(Uv::new(3.0, 0.0), Uv::new(3.0, 2.0));
        let distance = distance_to(Uv::ZERO, Uv::new(1.0, 0.0), edge).expect("hit");
        assert!((distance - 3.0).abs() < 1e-12);
    }

    #[test]
    fn collinear_edge_reports_nearest_end_ahead() {
        let ahead = UvLine::new(Uv::new(5.0, 0.0), Uv::new(3.0, 0.0));
        assert_eq!(distance_to(Uv::ZERO, Uv::new(1.0, 0.0), ahead), Some(3.0));

        let covering = UvLine::new(Uv::new(-1.0, 0.0), Uv::new(1.0, 0.0));
        assert_eq!(distance_to(Uv::ZERO, Uv::new(1.0, 0.0), covering), Some(0.0));

        let behind = UvLine::new(Uv::new(-3.0, 0.0), Uv::new(-1.0, 0.0));
        assert_eq!(distance_to(Uv::ZERO, Uv::new(1.0, 0.0), behind), None);
    }
}
