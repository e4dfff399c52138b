use floorsim_core::{BarrierType, Index, OverlapState, Uv};

/// One square of the cellular floor.
///
/// Edge sets hold indices into the edge arrays of the owning
/// [`FloorGeometry`](crate::FloorGeometry), one set per barrier class.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    index: Index,
    id: usize,
    center: Uv,
    overlap: [OverlapState; 3],
    edges: [Vec<usize>; 3],
    end_point_edges: [Vec<usize>; 3],
    buffer_edges: [Vec<usize>; 3],
}

impl Cell {
    pub(crate) fn new(index: Index, id: usize, center: Uv) -> Self {
        Self {
            index,
            id,
            center,
            overlap: [OverlapState::Outside; 3],
            edges: Default::default(),
            end_point_edges: Default::default(),
            buffer_edges: Default::default(),
        }
    }

    /// Grid coordinate of the cell.
    #[must_use]
    pub const fn index(&self) -> Index {
        self.index
    }

    /// Unique id of the cell.
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Centre point of the cell.
    #[must_use]
    pub const fn center(&self) -> Uv {
        self.center
    }

    /// Classification of the cell for the barrier class.
    #[must_use]
    pub const fn overlap(&self, barrier: BarrierType) -> OverlapState {
        self.overlap[barrier.slot()]
    }

    /// Edges of the class whose segment passes through the cell.
    #[must_use]
    pub fn edges(&self, barrier: BarrierType) -> &[usize] {
        &self.edges[barrier.slot()]
    }

    /// Edges of the class that start or end inside the cell.
    #[must_use]
    pub fn end_point_edges(&self, barrier: BarrierType) -> &[usize] {
        &self.end_point_edges[barrier.slot()]
    }

    /// Edges of the class registered anywhere in the 3x3 block around the cell.
    #[must_use]
    pub fn buffer_edges(&self, barrier: BarrierType) -> &[usize] {
        &self.buffer_edges[barrier.slot()]
    }

    /// Reports whether an edge of the class starts or ends inside the cell.
    #[must_use]
    pub fn is_end_point_cell(&self, barrier: BarrierType) -> bool {
        !self.end_point_edges[barrier.slot()].is_empty()
    }

    /// Reports whether the cell is inside the field and not inside a physical
    /// obstacle.
    #[must_use]
    pub fn is_walkable(&self) -> bool {
        self.overlap(BarrierType::Field) != OverlapState::Outside
            && self.overlap(BarrierType::Physical) != OverlapState::Inside
    }

    pub(crate) fn set_overlap(&mut self, barrier: BarrierType, state: OverlapState) {
        self.overlap[barrier.slot()] = state;
    }

    /// Registers an edge; edges arrive in increasing order per class.
    pub(crate) fn register_edge(&mut self, barrier: BarrierType, edge: usize) {
        let edges = &mut self.edges[barrier.slot()];
        if edges.last() != Some(&edge) {
            edges.push(edge);
        }
    }

    pub(crate) fn register_end_point(&mut self, barrier: BarrierType, edge: usize) {
        self.register_edge(barrier, edge);
        let edges = &mut self.end_point_edges[barrier.slot()];
        if edges.last() != Some(&edge) {
            edges.push(edge);
        }
    }

    pub(crate) fn set_buffer_edges(&mut self, barrier: BarrierType, edges: Vec<usize>) {
        self.buffer_edges[barrier.slot()] = edges;
    }
}
