//! Walking-distance potential fields towards a destination.

use std::{cmp::Ordering, collections::BinaryHeap, sync::Arc};

use floorsim_core::{GridFrame, Index, Uv};
use floorsim_floor::{FloorGeometry, SpatialDataField};

use crate::ScenarioError;

/// Destinations closer than this many cells are approached in a straight line.
const DIRECT_APPROACH_CELLS: f64 = 1.5;

/// Shortest walking distance from every walkable cell to a destination.
#[derive(Clone, Debug)]
pub struct PotentialField {
    frame: GridFrame,
    destination: Uv,
    data: Arc<SpatialDataField>,
}

impl PotentialField {
    /// Runs an eight-connected Dijkstra search over the walkable cells,
    /// starting from the cell that contains `destination`.
    ///
    /// Diagonal moves are only allowed when both adjacent orthogonal cells are
    /// walkable too, so paths never cut obstacle corners.
    pub fn from_destination(
        name: &str,
        geometry: &FloorGeometry,
        destination: Uv,
    ) -> Result<Self, ScenarioError> {
        let frame = *geometry.frame();
        let cells = geometry.cells();
        let source = geometry
            .cell_at(destination)
            .filter(|cell| cell.is_walkable())
            .ok_or_else(|| ScenarioError::UnreachableDestination {
                activity: name.to_owned(),
                destination,
            })?;

        let walkable: Vec<bool> = cells.iter().map(|cell| cell.is_walkable()).collect();
        let mut costs = vec![f64::INFINITY; cells.len()];
        let mut heap = BinaryHeap::new();
        costs[source.id()] = source.center().distance(destination);
        heap.push(Frontier {
            cost: costs[source.id()],
            id: source.id(),
        });

        while let Some(Frontier { cost, id }) = heap.pop() {
            if cost > costs[id] {
                continue;
            }
            let index = cells[id].index();
            for neighbor in frame.neighbors(index) {
                let Some(neighbor_id) = frame.cell_id(neighbor) else {
                    continue;
                };
                if !walkable[neighbor_id] || cuts_corner(&frame, &walkable, index, neighbor) {
                    continue;
                }
                let next = cost + cells[id].center().distance(cells[neighbor_id].center());
                if next < costs[neighbor_id] {
                    costs[neighbor_id] = next;
                    heap.push(Frontier {
                        cost: next,
                        id: neighbor_id,
                    });
                }
            }
        }

        let values = costs
            .into_iter()
            .map(|cost| cost.is_finite().then_some(cost))
            .collect();

        Ok(Self {
            frame,
            destination,
            data: Arc::new(SpatialDataField::new(name, values)),
        })
    }

    /// Name of the field.
    #[must_use]
    pub fn name(&self) -> &str {
        self.data.name()
    }

    /// Point the field descends towards.
    #[must_use]
    pub const fn destination(&self) -> Uv {
        self.destination
    }

    /// Per-cell walking distances.
    #[must_use]
    pub fn data(&self) -> &Arc<SpatialDataField> {
        &self.data
    }

    /// Walking distance stored for the cell under `point`.
    #[must_use]
    pub fn value_at(&self, point: Uv) -> Option<f64> {
        self.frame
            .find_index(point)
            .and_then(|index| self.value(index))
    }

    /// Unit direction of steepest descent at `point`.
    ///
    /// Uses central differences where both neighbours are reachable and
    /// one-sided differences otherwise. Falls back to the lowest neighbouring
    /// cell on a plateau, and to the straight line once the destination is
    /// within one and a half cells.
    #[must_use]
    pub fn gradient_direction(&self, point: Uv) -> Option<Uv> {
        let index = self.frame.find_index(point)?;
        let here = self.value(index)?;
        let size = self.frame.cell_size();

        if point.distance(self.destination) <= DIRECT_APPROACH_CELLS * size {
            return (self.destination - point).try_normalize();
        }

        let gradient = Uv::new(
            self.difference(index, Index::new(1, 0), here),
            self.difference(index, Index::new(0, 1), here),
        );

        (-gradient).try_normalize().or_else(|| {
            self.frame
                .neighbors(index)
                .filter_map(|neighbor| self.value(neighbor).map(|value| (neighbor, value)))
                .filter(|(_, value)| *value < here)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .and_then(|(neighbor, _)| (self.frame.cell_center(neighbor) - point).try_normalize())
        })
    }

    fn value(&self, index: Index) -> Option<f64> {
        self.frame
            .cell_id(index)
            .and_then(|id| self.data.value(id))
    }

    fn difference(&self, index: Index, axis: Index, here: f64) -> f64 {
        let size = self.frame.cell_size();
        match (self.value(index + axis), self.value(index - axis)) {
            (Some(plus), Some(minus)) => (plus - minus) / (2.0 * size),
            (Some(plus), None) => (plus - here) / size,
            (None, Some(minus)) => (here - minus) / size,
            (None, None) => 0.0,
        }
    }
}

fn cuts_corner(frame: &GridFrame, walkable: &[bool], from: Index, to: Index) -> bool {
    let step = to - from;
    if step.i() == 0 || step.j() == 0 {
        return false;
    }
    [Index::new(step.i(), 0), Index::new(0, step.j())]
        .into_iter()
        .any(|offset| {
            frame
                .cell_id(from + offset)
                .map_or(true, |id| !walkable[id])
        })
}

#[derive(Clone, Copy, Debug)]
struct Frontier {
    cost: f64,
    id: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    // Reversed so the binary heap pops the cheapest entry first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.id.cmp(&self.id))
    }
}
