//! Wavefront propagation of barrier distance fields.

use std::collections::{BTreeMap, BTreeSet};

use floorsim_core::{BarrierType, Barriers, Index, OverlapState, Tolerance, Uv, UvLine};
use rayon::prelude::*;
use tracing::debug;

use crate::{FloorError, FloorGeometry, SpatialDataField, SpatialDataRegistry};

/// Floor geometry extended with per-class distance-to-barrier fields.
///
/// Distances are registered in the [`SpatialDataRegistry`] under
/// [`BarrierType::distance_field_name`]; cells outside the walkable field carry
/// no value.
#[derive(Debug)]
pub struct CellularFloor {
    geometry: FloorGeometry,
    nearest: [Vec<Option<usize>>; 3],
    spatial_data: SpatialDataRegistry,
}

impl CellularFloor {
    /// Builds the geometry and its distance fields in one go.
    pub fn build(
        cell_size: f64,
        barriers: &Barriers,
        seed: Uv,
        tolerance: Tolerance,
    ) -> Result<Self, FloorError> {
        FloorGeometry::new(cell_size, barriers, seed, tolerance).map(Self::new)
    }

    /// Computes the distance fields of an existing geometry.
    #[must_use]
    pub fn new(geometry: FloorGeometry) -> Self {
        let propagated: Vec<Propagation> = BarrierType::ALL
            .par_iter()
            .map(|barrier| propagate(&geometry, *barrier))
            .collect();

        let spatial_data = SpatialDataRegistry::default();
        let mut nearest: [Vec<Option<usize>>; 3] = Default::default();

        for (barrier, mut propagation) in BarrierType::ALL.into_iter().zip(propagated) {
            prune_outside_field(&geometry, &mut propagation);
            debug!(
                barrier = ?barrier,
                rounds = propagation.rounds,
                "distance field propagated"
            );

            let values = propagation
                .distances
                .iter()
                .map(|distance| distance.is_finite().then_some(*distance))
                .collect();
            let _ = spatial_data.add(SpatialDataField::new(barrier.distance_field_name(), values));
            nearest[barrier.slot()] = propagation.nearest;
        }

        Self {
            geometry,
            nearest,
            spatial_data,
        }
    }

    /// Underlying grid and classification.
    #[must_use]
    pub const fn geometry(&self) -> &FloorGeometry {
        &self.geometry
    }

    /// Registry holding the distance fields and any collaborator fields.
    #[must_use]
    pub const fn spatial_data(&self) -> &SpatialDataRegistry {
        &self.spatial_data
    }

    /// Distance from the centre of the cell at `index` to the nearest edge of
    /// the class.
    #[must_use]
    pub fn distance(&self, barrier: BarrierType, index: Index) -> Option<f64> {
        let id = self.geometry.frame().cell_id(index)?;
        self.spatial_data
            .get(barrier.distance_field_name())
            .and_then(|field| field.value(id))
    }

    /// Distance stored for the cell under `point`.
    #[must_use]
    pub fn distance_at(&self, barrier: BarrierType, point: Uv) -> Option<f64> {
        self.geometry
            .find_index(point)
            .and_then(|index| self.distance(barrier, index))
    }

    /// Edge of the class nearest to the centre of the cell at `index`.
    #[must_use]
    pub fn nearest_edge(&self, barrier: BarrierType, index: Index) -> Option<usize> {
        let id = self.geometry.frame().cell_id(index)?;
        self.nearest[barrier.slot()].get(id).copied().flatten()
    }
}

struct Propagation {
    distances: Vec<f64>,
    nearest: Vec<Option<usize>>,
    rounds: usize,
}

/// Expands the wavefront of one class from the cells its edges cross.
///
/// Every cell keeps the candidate edges lying within a cell diagonal of its
/// current minimum and hands all of them to its neighbours. An edge that is
/// nearest to a cell centre is within a diagonal of the minimum of every cell
/// on the straight line towards it, so it reaches the cell and the stored
/// distance is exact.
fn propagate(geometry: &FloorGeometry, barrier: BarrierType) -> Propagation {
    let frame = geometry.frame();
    let edges = geometry.edges(barrier);
    let cells = geometry.cells();
    let diagonal = frame.diagonal();

    let mut distances = vec![f64::INFINITY; cells.len()];
    let mut nearest = vec![None; cells.len()];
    let mut candidates: Vec<Vec<usize>> = vec![Vec::new(); cells.len()];
    let mut pinned = vec![false; cells.len()];
    let mut frontier = Vec::new();

    for cell in cells {
        let id = cell.id();
        if barrier == BarrierType::Field && cell.overlap(barrier) == OverlapState::Outside {
            distances[id] = 0.0;
            pinned[id] = true;
            continue;
        }
        if cell.overlap(barrier) != OverlapState::Overlap {
            continue;
        }
        if let Some(kept) = keep_candidates(cell.center(), cell.buffer_edges(barrier), edges, diagonal) {
            distances[id] = kept.distance;
            nearest[id] = Some(kept.nearest);
            candidates[id] = kept.edges;
            frontier.push(cell.index());
        }
    }

    let mut rounds = 0;
    while !frontier.is_empty() {
        rounds += 1;
        let mut incoming: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();

        for index in frontier.drain(..) {
            let Some(id) = frame.cell_id(index) else {
                continue;
            };
            for neighbor in frame.neighbors(index) {
                let Some(neighbor_id) = frame.cell_id(neighbor) else {
                    continue;
                };
                if pinned[neighbor_id] || neighbor_id == id {
                    continue;
                }
                incoming
                    .entry(neighbor_id)
                    .or_default()
                    .extend(candidates[id].iter().copied());
            }
        }

        for (id, arriving) in incoming {
            let known = &candidates[id];
            if arriving.iter().all(|edge| known.binary_search(edge).is_ok()) {
                continue;
            }
            let mut merged: BTreeSet<usize> = arriving;
            merged.extend(known.iter().copied());
            let merged: Vec<usize> = merged.into_iter().collect();
            let Some(kept) = keep_candidates(cells[id].center(), &merged, edges, diagonal) else {
                continue;
            };
            if kept.edges == candidates[id] {
                continue;
            }
            distances[id] = kept.distance;
            nearest[id] = Some(kept.nearest);
            candidates[id] = kept.edges;
            frontier.push(cells[id].index());
        }
    }

    Propagation {
        distances,
        nearest,
        rounds,
    }
}

struct Candidates {
    edges: Vec<usize>,
    nearest: usize,
    distance: f64,
}

/// Nearest of the candidate edges plus every candidate within `slack` of it,
/// in increasing edge order.
fn keep_candidates(point: Uv, candidates: &[usize], edges: &[UvLine], slack: f64) -> Option<Candidates> {
    let measured: Vec<(usize, f64)> = candidates
        .iter()
        .filter_map(|&edge| edges.get(edge).map(|line| (edge, line.distance_to(point))))
        .collect();
    let (nearest, distance) = measured
        .iter()
        .copied()
        .min_by(|a, b| a.1.total_cmp(&b.1))?;
    let limit = distance + slack + 1e-9;
    let edges = measured
        .into_iter()
        .filter(|(_, to)| *to <= limit)
        .map(|(edge, _)| edge)
        .collect();

    Some(Candidates {
        edges,
        nearest,
        distance,
    })
}

fn prune_outside_field(geometry: &FloorGeometry, propagation: &mut Propagation) {
    for cell in geometry.cells() {
        if cell.overlap(BarrierType::Field) == OverlapState::Outside {
            propagation.distances[cell.id()] = f64::INFINITY;
            propagation.nearest[cell.id()] = None;
        }
    }
}
