//! Digital differential analyser that walks the grid cells crossed by a ray.

use floorsim_core::{GridFrame, Index, Uv, UvLine};

use crate::RayError;

/// Intervals shorter than this fraction of a cell are skipped.
const SLIVER: f64 = 1e-10;

/// Ray clipped against a grid frame.
///
/// The ray starts at `origin`, travels along a unit `direction` and is limited
/// to the parameter interval where it overlaps the grid (and, optionally, to a
/// maximum length).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridRay {
    origin: Uv,
    direction: Uv,
    frame: GridFrame,
    start: f64,
    end: f64,
}

/// One cell visited by a [`GridRay`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayStep {
    /// Cell crossed by the ray.
    pub index: Index,
    /// Ray length at which the ray enters the cell.
    pub entry: f64,
    /// Ray length at which the ray leaves the cell.
    pub exit: f64,
}

impl GridRay {
    /// Creates a ray from an origin and a direction of any non-zero length.
    ///
    /// Without `max_length` the ray runs until it leaves the grid.
    pub fn new(
        origin: Uv,
        direction: Uv,
        frame: GridFrame,
        max_length: Option<f64>,
    ) -> Result<Self, RayError> {
        let direction = direction.try_normalize().ok_or(RayError::ZeroDirection)?;
        let limit = max_length.unwrap_or(f64::INFINITY).max(0.0);
        let (start, end) =
            clip_parameters(origin, direction, frame.origin(), frame.max(), limit).unwrap_or((0.0, 0.0));

        Ok(Self {
            origin,
            direction,
            frame,
            start,
            end,
        })
    }

    /// Creates a ray covering exactly the provided segment.
    pub fn through(line: UvLine, frame: GridFrame) -> Result<Self, RayError> {
        Self::new(line.start, line.direction(), frame, Some(line.length()))
    }

    /// Point the ray starts from.
    #[must_use]
    pub const fn origin(&self) -> Uv {
        self.origin
    }

    /// Unit direction of travel.
    #[must_use]
    pub const fn direction(&self) -> Uv {
        self.direction
    }

    /// Ray length at which the ray leaves the grid or reaches its limit.
    #[must_use]
    pub const fn end(&self) -> f64 {
        self.end
    }

    /// Point located `length` units along the ray.
    #[must_use]
    pub fn point_at(&self, length: f64) -> Uv {
        self.origin + self.direction * length
    }

    /// Iterates the crossed cells in travel order.
    #[must_use]
    pub fn steps(&self) -> GridRaySteps {
        let cell = self.frame.cell_size();
        let local = (self.point_at(self.start) - self.frame.origin()) / cell;
        let (next_u, delta_u) = first_crossing(local.x, self.direction.x, cell, self.start);
        let (next_v, delta_v) = first_crossing(local.y, self.direction.y, cell, self.start);

        GridRaySteps {
            ray: *self,
            length: self.start,
            next_u,
            next_v,
            delta_u,
            delta_v,
        }
    }

    /// Iterates the indices of the crossed cells in travel order.
    pub fn indices(&self) -> impl Iterator<Item = Index> {
        self.steps().map(|step| step.index)
    }
}

/// Iterator over the cells crossed by a [`GridRay`].
#[derive(Clone, Debug)]
pub struct GridRaySteps {
    ray: GridRay,
    length: f64,
    next_u: f64,
    next_v: f64,
    delta_u: f64,
    delta_v: f64,
}

impl GridRaySteps {
    /// Advances to the next crossed cell and returns its index.
    pub fn next_index(&mut self) -> Option<Index> {
        self.next().map(|step| step.index)
    }
}

impl Iterator for GridRaySteps {
    type Item = RayStep;

    fn next(&mut self) -> Option<RayStep> {
        loop {
            if self.length >= self.ray.end {
                return None;
            }

            let entry = self.length;
            let exit = self.next_u.min(self.next_v).min(self.ray.end);

            // Ties cross a grid corner and advance both axes at once.
            if self.next_u <= exit {
                self.next_u += self.delta_u;
            }
            if self.next_v <= exit {
                self.next_v += self.delta_v;
            }
            self.length = exit;

            if exit - entry <= SLIVER * self.ray.frame.cell_size() {
                continue;
            }

            let midpoint = self.ray.point_at((entry + exit) * 0.5);
            let index = self.ray.frame.clamp(self.ray.frame.raw_index(midpoint));
            return Some(RayStep { index, entry, exit });
        }
    }
}

fn first_crossing(local: f64, direction: f64, cell: f64, length: f64) -> (f64, f64) {
    if direction > 0.0 {
        let line = local.floor() + 1.0;
        (
            length + (line - local) * cell / direction,
            cell / direction,
        )
    } else if direction < 0.0 {
        let line = local.ceil() - 1.0;
        (
            length + (local - line) * cell / -direction,
            cell / -direction,
        )
    } else {
        (f64::INFINITY, f64::INFINITY)
    }
}

/// Slab clipping of the parametric ray against an axis-aligned box.
fn clip_parameters(origin: Uv, direction: Uv, min: Uv, max: Uv, limit: f64) -> Option<(f64, f64)> {
    let mut enter = 0.0_f64;
    let mut leave = limit;

    for (o, d, lo, hi) in [
        (origin.x, direction.x, min.x, max.x),
        (origin.y, direction.y, min.y, max.y),
    ] {
        if d == 0.0 {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }
        let a = (lo - o) / d;
        let b = (hi - o) / d;
        enter = enter.max(a.min(b));
        leave = leave.min(a.max(b));
    }

    (enter < leave).then_some((enter, leave))
}
