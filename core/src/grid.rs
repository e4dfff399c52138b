//! Integer cell coordinates and the uniform grid frame that maps them to space.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::Uv;

/// Integer coordinate of a grid cell.
///
/// `i` counts cells along the U axis and `j` along the V axis. An index is only
/// meaningful for a [`GridFrame`] that [contains](GridFrame::contains) it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Index {
    i: i32,
    j: i32,
}

impl Index {
    /// The eight offsets of the Moore neighbourhood.
    pub const NEIGHBORS: [Index; 8] = [
        Index::new(-1, -1),
        Index::new(0, -1),
        Index::new(1, -1),
        Index::new(-1, 0),
        Index::new(1, 0),
        Index::new(-1, 1),
        Index::new(0, 1),
        Index::new(1, 1),
    ];

    /// The four offsets of the von Neumann neighbourhood.
    pub const CROSS_NEIGHBORS: [Index; 4] = [
        Index::new(0, -1),
        Index::new(-1, 0),
        Index::new(1, 0),
        Index::new(0, 1),
    ];

    /// Creates a new index.
    #[must_use]
    pub const fn new(i: i32, j: i32) -> Self {
        Self { i, j }
    }

    /// Column along the U axis.
    #[must_use]
    pub const fn i(&self) -> i32 {
        self.i
    }

    /// Row along the V axis.
    #[must_use]
    pub const fn j(&self) -> i32 {
        self.j
    }
}

impl Add for Index {
    type Output = Index;

    fn add(self, rhs: Index) -> Index {
        Index::new(self.i + rhs.i, self.j + rhs.j)
    }
}

impl Sub for Index {
    type Output = Index;

    fn sub(self, rhs: Index) -> Index {
        Index::new(self.i - rhs.i, self.j - rhs.j)
    }
}

impl Mul<i32> for Index {
    type Output = Index;

    fn mul(self, rhs: i32) -> Index {
        Index::new(self.i * rhs, self.j * rhs)
    }
}

/// Placement and resolution of a uniform grid of square cells.
///
/// Cell ids are assigned as `i * height + j`, which [`GridFrame::index_of_id`]
/// inverts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridFrame {
    origin: Uv,
    cell_size: f64,
    width: u32,
    height: u32,
}

impl GridFrame {
    /// Creates a frame whose lower-left corner sits at `origin`.
    #[must_use]
    pub const fn new(origin: Uv, cell_size: f64, width: u32, height: u32) -> Self {
        Self {
            origin,
            cell_size,
            width,
            height,
        }
    }

    /// Lower-left corner of the grid.
    #[must_use]
    pub const fn origin(&self) -> Uv {
        self.origin
    }

    /// Upper-right corner of the grid.
    #[must_use]
    pub fn max(&self) -> Uv {
        self.origin
            + Uv::new(
                f64::from(self.width) * self.cell_size,
                f64::from(self.height) * self.cell_size,
            )
    }

    /// Side length of a cell.
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Length of a cell diagonal.
    #[must_use]
    pub fn diagonal(&self) -> f64 {
        self.cell_size * std::f64::consts::SQRT_2
    }

    /// Number of cells along the U axis.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of cells along the V axis.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Total number of cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Reports whether the index addresses a cell of this grid.
    #[must_use]
    pub fn contains(&self, index: Index) -> bool {
        index.i >= 0 && index.j >= 0 && (index.i as u32) < self.width && (index.j as u32) < self.height
    }

    /// Index of the cell covering `point`, without bounds checking.
    #[must_use]
    pub fn raw_index(&self, point: Uv) -> Index {
        let local = (point - self.origin) / self.cell_size;
        Index::new(saturate(local.x.floor()), saturate(local.y.floor()))
    }

    /// Index of the cell covering `point`, if the point lies on the grid.
    #[must_use]
    pub fn find_index(&self, point: Uv) -> Option<Index> {
        let index = self.raw_index(point);
        self.contains(index).then_some(index)
    }

    /// Id of the cell at `index`.
    #[must_use]
    pub fn cell_id(&self, index: Index) -> Option<usize> {
        if !self.contains(index) {
            return None;
        }
        Some(index.i as usize * self.height as usize + index.j as usize)
    }

    /// Index of the cell with the provided id.
    #[must_use]
    pub fn index_of_id(&self, id: usize) -> Option<Index> {
        if id >= self.cell_count() || self.height == 0 {
            return None;
        }
        let height = self.height as usize;
        Some(Index::new((id / height) as i32, (id % height) as i32))
    }

    /// Lower-left corner of the cell at `index`.
    #[must_use]
    pub fn cell_origin(&self, index: Index) -> Uv {
        self.origin + Uv::new(f64::from(index.i), f64::from(index.j)) * self.cell_size
    }

    /// Centre of the cell at `index`.
    #[must_use]
    pub fn cell_center(&self, index: Index) -> Uv {
        self.cell_origin(index) + Uv::splat(self.cell_size * 0.5)
    }

    /// Clamps the index onto the grid.
    #[must_use]
    pub fn clamp(&self, index: Index) -> Index {
        let max_i = self.width.saturating_sub(1) as i32;
        let max_j = self.height.saturating_sub(1) as i32;
        Index::new(index.i.clamp(0, max_i), index.j.clamp(0, max_j))
    }

    /// Valid cells of the eight-connected neighbourhood of `index`.
    pub fn neighbors(&self, index: Index) -> impl Iterator<Item = Index> + '_ {
        Index::NEIGHBORS
            .into_iter()
            .map(move |offset| index + offset)
            .filter(|candidate| self.contains(*candidate))
    }

    /// Valid cells of the four-connected neighbourhood of `index`.
    pub fn cross_neighbors(&self, index: Index) -> impl Iterator<Item = Index> + '_ {
        Index::CROSS_NEIGHBORS
            .into_iter()
            .map(move |offset| index + offset)
            .filter(|candidate| self.contains(*candidate))
    }
}

fn saturate(value: f64) -> i32 {
    if value.is_nan() {
        return i32::MIN;
    }
    value.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}
