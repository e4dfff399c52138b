//! Grid construction, edge registration and per-class cell classification.

use std::collections::{BTreeSet, VecDeque};

use floorsim_core::{
    BarrierType, Barriers, GridFrame, Index, OverlapState, Tolerance, Uv, UvLine,
};
use tracing::debug;

use crate::{Cell, FloorError, GridRay, RayError};

/// Location of an edge inside the barrier input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EdgeAddress {
    /// Position of the polygon within its barrier class.
    pub polygon: usize,
    /// Index of the polygon vertex the edge starts from.
    pub point: usize,
}

/// Uniform grid over the barrier geometry with every cell classified per class.
///
/// The structure is built once and is read-only afterwards, so it can be
/// shared freely between threads that query it.
#[derive(Clone, Debug)]
pub struct FloorGeometry {
    frame: GridFrame,
    tolerance: Tolerance,
    seed: Uv,
    cells: Vec<Cell>,
    edges: [Vec<UvLine>; 3],
    addresses: [Vec<EdgeAddress>; 3],
    territory_min: Uv,
    territory_max: Uv,
}

impl FloorGeometry {
    /// Builds the grid, registers every barrier edge and classifies every cell.
    ///
    /// `seed` must lie in walkable space: the flood fill that separates the
    /// inside from the outside of each barrier class starts from its cell.
    pub fn new(
        cell_size: f64,
        barriers: &Barriers,
        seed: Uv,
        tolerance: Tolerance,
    ) -> Result<Self, FloorError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(FloorError::NonPositiveCellSize(cell_size));
        }

        let (edges, addresses) = collect_edges(barriers, tolerance)?;
        let frame = fit_frame(barriers, cell_size)?;

        let mut cells: Vec<Cell> = (0..frame.cell_count())
            .filter_map(|id| {
                frame
                    .index_of_id(id)
                    .map(|index| Cell::new(index, id, frame.cell_center(index)))
            })
            .collect();

        for barrier in BarrierType::ALL {
            register_edges(&frame, &mut cells, barrier, &edges[barrier.slot()])?;
        }

        let seed_index = frame
            .find_index(seed)
            .ok_or(FloorError::SeedOutsideGrid { seed })?;
        for barrier in BarrierType::ALL {
            classify(&frame, &mut cells, barrier, seed_index, seed)?;
            assign_buffer_edges(&frame, &mut cells, barrier);
        }

        let (territory_min, territory_max) = territory(&frame, &cells);

        debug!(
            width = frame.width(),
            height = frame.height(),
            cell_size = frame.cell_size(),
            visual_edges = edges[BarrierType::Visual.slot()].len(),
            physical_edges = edges[BarrierType::Physical.slot()].len(),
            field_edges = edges[BarrierType::Field.slot()].len(),
            "floor geometry built"
        );

        Ok(Self {
            frame,
            tolerance,
            seed,
            cells,
            edges,
            addresses,
            territory_min,
            territory_max,
        })
    }

    /// Placement and resolution of the grid.
    #[must_use]
    pub const fn frame(&self) -> &GridFrame {
        &self.frame
    }

    /// Geometric tolerance shared by every query against this floor.
    #[must_use]
    pub const fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// Walkable seed point the classification started from.
    #[must_use]
    pub const fn seed(&self) -> Uv {
        self.seed
    }

    /// Side length of a cell.
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.frame.cell_size()
    }

    /// Number of cells along the U axis.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.frame.width()
    }

    /// Number of cells along the V axis.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.frame.height()
    }

    /// All cells ordered by id.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Index of the cell covering `point`.
    #[must_use]
    pub fn find_index(&self, point: Uv) -> Option<Index> {
        self.frame.find_index(point)
    }

    /// Cell at the provided index.
    #[must_use]
    pub fn find_cell(&self, index: Index) -> Option<&Cell> {
        self.frame
            .cell_id(index)
            .and_then(|id| self.cells.get(id))
    }

    /// Cell with the provided id.
    #[must_use]
    pub fn find_cell_by_id(&self, id: usize) -> Option<&Cell> {
        self.cells.get(id)
    }

    /// Cell covering `point`.
    #[must_use]
    pub fn cell_at(&self, point: Uv) -> Option<&Cell> {
        self.find_index(point).and_then(|index| self.find_cell(index))
    }

    /// Edges of a barrier class.
    #[must_use]
    pub fn edges(&self, barrier: BarrierType) -> &[UvLine] {
        &self.edges[barrier.slot()]
    }

    /// Single edge of a barrier class.
    #[must_use]
    pub fn edge(&self, barrier: BarrierType, edge: usize) -> Option<UvLine> {
        self.edges[barrier.slot()].get(edge).copied()
    }

    /// Polygon and vertex an edge was built from.
    #[must_use]
    pub fn edge_address(&self, barrier: BarrierType, edge: usize) -> Option<EdgeAddress> {
        self.addresses[barrier.slot()].get(edge).copied()
    }

    /// Lower corner of the box around the walkable cells, padded by a cell.
    #[must_use]
    pub const fn territory_min(&self) -> Uv {
        self.territory_min
    }

    /// Upper corner of the box around the walkable cells, padded by a cell.
    #[must_use]
    pub const fn territory_max(&self) -> Uv {
        self.territory_max
    }

    /// Classification of the cell under `point` for the barrier class.
    #[must_use]
    pub fn overlap_at(&self, point: Uv, barrier: BarrierType) -> Option<OverlapState> {
        self.cell_at(point).map(|cell| cell.overlap(barrier))
    }

    /// Reports whether `point` lies in a cell that is inside the field and not
    /// inside a physical obstacle.
    #[must_use]
    pub fn is_walkable(&self, point: Uv) -> bool {
        self.cell_at(point).is_some_and(Cell::is_walkable)
    }

    /// Creates a ray against this floor's grid.
    pub fn ray(&self, origin: Uv, direction: Uv, max_length: Option<f64>) -> Result<GridRay, RayError> {
        GridRay::new(origin, direction, self.frame, max_length)
    }

    /// Clips a segment to the grid bounds (Liang–Barsky).
    ///
    /// Returns `None` when the segment lies completely outside the grid.
    #[must_use]
    pub fn clip_to_grid(&self, line: UvLine) -> Option<UvLine> {
        let min = self.frame.origin();
        let max = self.frame.max();
        let delta = line.direction();
        let mut enter = 0.0_f64;
        let mut leave = 1.0_f64;

        for (p, q) in [
            (-delta.x, line.start.x - min.x),
            (delta.x, max.x - line.start.x),
            (-delta.y, line.start.y - min.y),
            (delta.y, max.y - line.start.y),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let ratio = q / p;
            if p < 0.0 {
                if ratio > leave {
                    return None;
                }
                enter = enter.max(ratio);
            } else {
                if ratio < enter {
                    return None;
                }
                leave = leave.min(ratio);
            }
        }

        Some(UvLine::new(
            line.start + delta * enter,
            line.start + delta * leave,
        ))
    }
}

type EdgeTables = ([Vec<UvLine>; 3], [Vec<EdgeAddress>; 3]);

fn collect_edges(barriers: &Barriers, tolerance: Tolerance) -> Result<EdgeTables, FloorError> {
    let mut edges: [Vec<UvLine>; 3] = Default::default();
    let mut addresses: [Vec<EdgeAddress>; 3] = Default::default();

    for barrier in BarrierType::ALL {
        for (polygon_index, polygon) in barriers.polygons(barrier).iter().enumerate() {
            if polygon.points.len() < 2 {
                return Err(FloorError::DegeneratePolygon {
                    barrier,
                    polygon: polygon_index,
                });
            }
            for (point, line) in polygon.edges() {
                if line.is_degenerate(tolerance) {
                    return Err(FloorError::ZeroLengthEdge {
                        barrier,
                        polygon: polygon_index,
                        point,
                    });
                }
                edges[barrier.slot()].push(line);
                addresses[barrier.slot()].push(EdgeAddress {
                    polygon: polygon_index,
                    point,
                });
            }
        }
    }

    Ok((edges, addresses))
}

/// Fits a grid around the physical barriers, padded by half a cell.
///
/// The column count is rounded down so the effective cell size is never
/// smaller than the requested one; rows are rounded up to cover the bounds.
fn fit_frame(barriers: &Barriers, desired: f64) -> Result<GridFrame, FloorError> {
    let physical = barriers
        .physical
        .iter()
        .flat_map(|polygon| polygon.points.iter().copied());
    let bounds = bounding_box(physical).or_else(|| bounding_box(barriers.all_points()));
    let (min, max) = bounds.ok_or(FloorError::EmptyGeometry)?;

    let padding = Uv::splat(desired * 0.5);
    let min = min - padding;
    let extent = (max + padding) - min;

    let columns = (extent.x / desired).floor().max(1.0);
    let size = extent.x / columns;
    let rows = extent.y / size;
    let rows = if (rows - rows.round()).abs() < 1e-9 {
        rows.round()
    } else {
        rows.ceil()
    }
    .max(1.0);

    Ok(GridFrame::new(min, size, columns as u32, rows as u32))
}

fn bounding_box(points: impl Iterator<Item = Uv>) -> Option<(Uv, Uv)> {
    points.fold(None, |bounds, point| match bounds {
        None => Some((point, point)),
        Some((min, max)) => Some((min.min(point), max.max(point))),
    })
}

fn register_edges(
    frame: &GridFrame,
    cells: &mut [Cell],
    barrier: BarrierType,
    edges: &[UvLine],
) -> Result<(), FloorError> {
    for (edge, line) in edges.iter().enumerate() {
        for index in GridRay::through(*line, *frame)?.indices() {
            if let Some(id) = frame.cell_id(index) {
                cells[id].register_edge(barrier, edge);
            }
        }
        for end in [line.start, line.end] {
            if let Some(id) = frame.find_index(end).and_then(|index| frame.cell_id(index)) {
                cells[id].register_end_point(barrier, edge);
            }
        }
    }
    Ok(())
}

/// Flood fills the barrier-free cells reachable from the seed.
///
/// Reached cells receive the class's clear state (`Inside` for the field,
/// `Outside` for obstacles) and unreached cells the opposite one.
fn classify(
    frame: &GridFrame,
    cells: &mut [Cell],
    barrier: BarrierType,
    seed_index: Index,
    seed: Uv,
) -> Result<(), FloorError> {
    let Some(seed_id) = frame.cell_id(seed_index) else {
        return Err(FloorError::SeedOutsideGrid { seed });
    };
    if !cells[seed_id].edges(barrier).is_empty() {
        return Err(FloorError::SeedOnBarrier { barrier, seed });
    }

    let mut reached = vec![false; cells.len()];
    let mut queue = VecDeque::new();
    reached[seed_id] = true;
    queue.push_back(seed_index);

    while let Some(index) = queue.pop_front() {
        for neighbor in frame.cross_neighbors(index) {
            let Some(id) = frame.cell_id(neighbor) else {
                continue;
            };
            if reached[id] || !cells[id].edges(barrier).is_empty() {
                continue;
            }
            reached[id] = true;
            queue.push_back(neighbor);
        }
    }

    let clear = barrier.clear_state();
    let blocked = match clear {
        OverlapState::Inside => OverlapState::Outside,
        _ => OverlapState::Inside,
    };
    for (cell, reached) in cells.iter_mut().zip(reached) {
        let state = if !cell.edges(barrier).is_empty() {
            OverlapState::Overlap
        } else if reached {
            clear
        } else {
            blocked
        };
        cell.set_overlap(barrier, state);
    }

    Ok(())
}

fn assign_buffer_edges(frame: &GridFrame, cells: &mut [Cell], barrier: BarrierType) {
    let buffers: Vec<Vec<usize>> = cells
        .iter()
        .map(|cell| {
            let mut union: BTreeSet<usize> = cell.edges(barrier).iter().copied().collect();
            for neighbor in frame.neighbors(cell.index()) {
                if let Some(id) = frame.cell_id(neighbor) {
                    union.extend(cells[id].edges(barrier).iter().copied());
                }
            }
            union.into_iter().collect()
        })
        .collect();

    for (cell, buffer) in cells.iter_mut().zip(buffers) {
        cell.set_buffer_edges(barrier, buffer);
    }
}

fn territory(frame: &GridFrame, cells: &[Cell]) -> (Uv, Uv) {
    let size = frame.cell_size();
    let corners = cells
        .iter()
        .filter(|cell| cell.overlap(BarrierType::Field) != OverlapState::Outside)
        .flat_map(|cell| {
            let origin = frame.cell_origin(cell.index());
            [origin, origin + Uv::splat(size)]
        });

    match bounding_box(corners) {
        Some((min, max)) => (min - Uv::splat(size), max + Uv::splat(size)),
        None => (frame.origin(), frame.max()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use floorsim_core::BarrierPolygon;

    fn square_field() -> Barriers {
        Barriers {
            field: vec![BarrierPolygon::rectangle(Uv::ZERO, Uv::new(10.0, 10.0))],
            ..Barriers::default()
        }
    }

    #[test]
    fn unit_square_field_has_eleven_cells_per_side() {
        let floor = FloorGeometry::new(1.0, &square_field(), Uv::new(5.0, 5.0), Tolerance::DEFAULT)
            .expect("valid floor");

        assert_eq!(floor.width(), 11);
        assert_eq!(floor.height(), 11);
        let cell = floor.find_cell(Index::new(5, 5)).expect("cell on grid");
        assert_eq!(cell.overlap(BarrierType::Field), OverlapState::Inside);
        assert_eq!(
            floor.overlap_at(Uv::new(0.0, 5.0), BarrierType::Field),
            Some(OverlapState::Overlap)
        );
    }

    #[test]
    fn seed_outside_grid_is_fatal() {
        let error = FloorGeometry::new(1.0, &square_field(), Uv::new(50.0, 5.0), Tolerance::DEFAULT)
            .unwrap_err();
        assert!(matches!(error, FloorError::SeedOutsideGrid { .. }));
    }

    #[test]
    fn seed_on_barrier_is_fatal() {
        let error = FloorGeometry::new(1.0, &square_field(), Uv::new(0.1, 5.0), Tolerance::DEFAULT)
            .unwrap_err();
        assert_eq!(
            error,
            FloorError::SeedOnBarrier {
                barrier: BarrierType::Field,
                seed: Uv::new(0.1, 5.0),
            }
        );
    }

    #[test]
    fn zero_length_edges_are_rejected() {
        let barriers = Barriers {
            field: vec![BarrierPolygon::closed(vec![
                Uv::ZERO,
                Uv::new(4.0, 0.0),
                Uv::new(4.0, 0.0),
                Uv::new(0.0, 4.0),
            ])],
            ..Barriers::default()
        };
        let error = FloorGeometry::new(1.0, &barriers, Uv::new(1.0, 1.0), Tolerance::DEFAULT)
            .unwrap_err();
        assert_eq!(
            error,
            FloorError::ZeroLengthEdge {
                barrier: BarrierType::Field,
                polygon: 0,
                point: 1,
            }
        );
    }

    #[test]
    fn empty_geometry_and_bad_cell_size_are_rejected() {
        assert_eq!(
            FloorGeometry::new(1.0, &Barriers::default(), Uv::ZERO, Tolerance::DEFAULT).unwrap_err(),
            FloorError::EmptyGeometry
        );
        assert_eq!(
            FloorGeometry::new(0.0, &square_field(), Uv::ZERO, Tolerance::DEFAULT).unwrap_err(),
            FloorError::NonPositiveCellSize(0.0)
        );
    }

    #[test]
    fn obstacle_interior_is_inside_for_physical_barriers() {
        let mut barriers = square_field();
        barriers.physical = vec![
            BarrierPolygon::rectangle(Uv::ZERO, Uv::new(10.0, 10.0)),
            BarrierPolygon::rectangle(Uv::new(3.0, 3.0), Uv::new(7.0, 7.0)),
        ];
        let floor = FloorGeometry::new(1.0, &barriers, Uv::new(1.5, 1.5), Tolerance::DEFAULT)
            .expect("valid floor");

        assert_eq!(
            floor.overlap_at(Uv::new(5.0, 5.0), BarrierType::Physical),
            Some(OverlapState::Inside)
        );
        assert_eq!(
            floor.overlap_at(Uv::new(1.5, 1.5), BarrierType::Physical),
            Some(OverlapState::Outside)
        );
        assert!(!floor.is_walkable(Uv::new(5.0, 5.0)));
        assert!(floor.is_walkable(Uv::new(1.5, 8.5)));
    }

    #[test]
    fn overlap_matches_registered_edges() {
        let floor = FloorGeometry::new(0.7, &square_field(), Uv::new(5.0, 5.0), Tolerance::DEFAULT)
            .expect("valid floor");

        for cell in floor.cells() {
            for barrier in BarrierType::ALL {
                let overlaps = cell.overlap(barrier) == OverlapState::Overlap;
                assert_eq!(overlaps, !cell.edges(barrier).is_empty());
            }
        }
    }

    #[test]
    fn end_point_cells_hold_their_corner_edges() {
        let floor = FloorGeometry::new(1.0, &square_field(), Uv::new(5.0, 5.0), Tolerance::DEFAULT)
            .expect("valid floor");
        let corner = floor.cell_at(Uv::ZERO).expect("corner on grid");

        assert!(corner.is_end_point_cell(BarrierType::Field));
        assert_eq!(corner.end_point_edges(BarrierType::Field), &[0, 3]);
        let interior = floor.cell_at(Uv::new(5.0, 5.0)).expect("interior on grid");
        assert!(!interior.is_end_point_cell(BarrierType::Field));
    }

    #[test]
    fn buffer_edges_include_neighbouring_cells() {
        let floor = FloorGeometry::new(1.0, &square_field(), Uv::new(5.0, 5.0), Tolerance::DEFAULT)
            .expect("valid floor");
        let near_wall = floor.find_cell(Index::new(1, 5)).expect("cell on grid");

        assert!(near_wall.edges(BarrierType::Field).is_empty());
        assert_eq!(near_wall.buffer_edges(BarrierType::Field), &[3]);
        let deep = floor.find_cell(Index::new(5, 5)).expect("cell on grid");
        assert!(deep.buffer_edges(BarrierType::Field).is_empty());
    }

    #[test]
    fn cell_lookup_by_id_agrees_with_index_lookup() {
        let floor = FloorGeometry::new(1.3, &square_field(), Uv::new(5.0, 5.0), Tolerance::DEFAULT)
            .expect("valid floor");

        for cell in floor.cells() {
            let by_id = floor.find_cell_by_id(cell.id()).expect("id exists");
            assert_eq!(by_id.index(), cell.index());
            assert_eq!(floor.find_index(cell.center()), Some(cell.index()));
            assert_eq!(floor.cell_at(cell.center()).map(Cell::id), Some(cell.id()));
        }
    }

    #[test]
    fn territory_wraps_the_field_with_one_cell_margin() {
        let floor = FloorGeometry::new(1.0, &square_field(), Uv::new(5.0, 5.0), Tolerance::DEFAULT)
            .expect("valid floor");

        assert_eq!(floor.territory_min(), Uv::new(-1.5, -1.5));
        assert_eq!(floor.territory_max(), Uv::new(11.5, 11.5));
    }

    #[test]
    fn clip_to_grid_trims_segments() {
        let floor = FloorGeometry::new(1.0, &square_field(), Uv::new(5.0, 5.0), Tolerance::DEFAULT)
            .expect("valid floor");

        let clipped = floor
            .clip_to_grid(UvLine::new(Uv::new(-10.0, 5.0), Uv::new(20.0, 5.0)))
            .expect("segment crosses grid");
        assert!((clipped.start.x + 0.5).abs() < 1e-12);
        assert!((clipped.end.x - 10.5).abs() < 1e-12);

        assert_eq!(
            floor.clip_to_grid(UvLine::new(Uv::new(-10.0, -5.0), Uv::new(-1.0, -5.0))),
            None
        );
    }
}
