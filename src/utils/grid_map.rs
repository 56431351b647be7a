// occupancy grid used by the planar arm validity check

use std::ops::Deref;
extern crate nalgebra as na;

use crate::common::{PlannerError, PlannerResult};

/// Occupancy grid with unit cells. Cell `(x, y)` is `grid[(y, x)]`,
/// non-zero means occupied.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    grid: na::DMatrix<i32>,
}

impl OccupancyGrid {
    /// Every cell of `original_matrix` becomes a `scale × scale` block
    pub fn new(original_matrix: na::DMatrix<i32>, scale: usize) -> PlannerResult<Self> {
        if scale < 1 {
            return Err(PlannerError::InvalidParameter("scale must be >= 1".to_string()));
        }
        if original_matrix.is_empty() {
            return Err(PlannerError::InvalidParameter("grid must not be empty".to_string()));
        }
        let grid = original_matrix.kronecker(&na::DMatrix::<i32>::repeat(scale, scale, 1));
        Ok(Self { grid })
    }

    /// Free grid of `x_size × y_size` cells
    pub fn empty(x_size: usize, y_size: usize) -> PlannerResult<Self> {
        Self::new(na::DMatrix::zeros(y_size, x_size), 1)
    }

    /// ASCII grid, `#` is occupied and anything else free. The first line
    /// is `y = 0`.
    pub fn from_rows(rows: &[&str]) -> PlannerResult<Self> {
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0);
        if width == 0 {
            return Err(PlannerError::InvalidParameter("grid must not be empty".to_string()));
        }
        if let Some(bad) = rows.iter().position(|r| r.chars().count() != width) {
            return Err(PlannerError::InvalidParameter(format!(
                "grid row {} has {} cells, expected {}",
                bad,
                rows[bad].chars().count(),
                width
            )));
        }
        let cells = rows
            .iter()
            .flat_map(|r| r.chars().map(|c| i32::from(c == '#')));
        Self::new(na::DMatrix::from_row_iterator(rows.len(), width, cells), 1)
    }

    pub fn x_size(&self) -> usize {
        self.grid.ncols()
    }

    pub fn y_size(&self) -> usize {
        self.grid.nrows()
    }

    /// Out-of-range cells count as occupied
    pub fn is_occupied(&self, x: usize, y: usize) -> bool {
        self.grid.get((y, x)).map_or(true, |&v| v != 0)
    }

    pub fn set_occupied(&mut self, x: usize, y: usize, occupied: bool) {
        if let Some(cell) = self.grid.get_mut((y, x)) {
            *cell = i32::from(occupied);
        }
    }

    /// True when the continuous point lies on the grid
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && y >= 0.0 && x < self.x_size() as f64 && y < self.y_size() as f64
    }

    /// Continuous coordinates to the enclosing cell, clamped to the grid
    pub fn cont_xy_to_cell(&self, x: f64, y: f64) -> (usize, usize) {
        let clamp = |v: f64, size: usize| -> usize {
            if v.is_nan() || v < 0.0 {
                0
            } else {
                (v.floor() as usize).min(size - 1)
            }
        };
        (clamp(x, self.x_size()), clamp(y, self.y_size()))
    }

    /// Segment lies on the grid and crosses only free cells
    pub fn is_valid_segment(&self, x0: f64, y0: f64, x1: f64, y1: f64) -> bool {
        if !self.contains(x0, y0) || !self.contains(x1, y1) {
            return false;
        }
        let start = self.cont_xy_to_cell(x0, y0);
        let end = self.cont_xy_to_cell(x1, y1);
        line_cells(start, end)
            .into_iter()
            .all(|(x, y)| !self.is_occupied(x, y))
    }

    /// Centers of the occupied cells, for plotting
    pub fn occupied_cells(&self) -> (Vec<f64>, Vec<f64>) {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for y in 0..self.y_size() {
            for x in 0..self.x_size() {
                if self.is_occupied(x, y) {
                    xs.push(x as f64 + 0.5);
                    ys.push(y as f64 + 0.5);
                }
            }
        }
        (xs, ys)
    }
}

impl Deref for OccupancyGrid {
    type Target = na::DMatrix<i32>;

    fn deref(&self) -> &Self::Target {
        &self.grid
    }
}

/// Bresenham cells from `start` to `end`, both included
pub fn line_cells(start: (usize, usize), end: (usize, usize)) -> Vec<(usize, usize)> {
    let (mut x, mut y) = (start.0 as i64, start.1 as i64);
    let (x1, y1) = (end.0 as i64, end.1 as i64);
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut cells = Vec::with_capacity((dx.max(-dy) + 1) as usize);
    loop {
        cells.push((x as usize, y as usize));
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    cells
}
