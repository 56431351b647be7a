//
// Planar N-link arm on an occupancy grid
//
// Joint-rate kinematics `θ̇ = u`. Every link has the same length and its
// angle is measured from the grid x axis. The base sits in the middle of
// the bottom row.
//

use std::f64::consts::PI;

use nalgebra::DMatrix;

use crate::common::{is_finite, Control, Dynamics, SampleBounds, State, ValidityChecker};
use crate::utils::OccupancyGrid;

/// Default link length in grid cells
pub const LINK_LENGTH_CELLS: f64 = 10.0;

/// Wrap an angle to `(−π, π]`
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI {
        wrapped + 2.0 * PI
    } else {
        wrapped
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlanarArm {
    links: usize,
}

impl PlanarArm {
    pub fn new(links: usize) -> Self {
        PlanarArm { links }
    }

    pub fn links(&self) -> usize {
        self.links
    }

    /// Joint angles sampled on `[0, 2π]`
    pub fn sample_bounds(&self) -> SampleBounds {
        SampleBounds::uniform(self.links, 0.0, 2.0 * PI)
    }
}

impl Dynamics for PlanarArm {
    fn state_dim(&self) -> usize {
        self.links
    }

    fn control_dim(&self) -> usize {
        self.links
    }

    fn derivative(&self, _state: &State, control: &Control) -> State {
        control.clone()
    }

    fn linearize(&self, _state: &State, _control: &Control) -> (DMatrix<f64>, DMatrix<f64>) {
        (
            DMatrix::zeros(self.links, self.links),
            DMatrix::identity(self.links, self.links),
        )
    }

    fn difference(&self, a: &State, b: &State) -> State {
        (a - b).map(wrap_angle)
    }
}

/// Rejects arm configurations that leave the grid or touch an occupied cell
#[derive(Debug, Clone)]
pub struct ArmValidityChecker {
    grid: OccupancyGrid,
    link_length: f64,
}

impl ArmValidityChecker {
    pub fn new(grid: OccupancyGrid) -> Self {
        ArmValidityChecker {
            grid,
            link_length: LINK_LENGTH_CELLS,
        }
    }

    pub fn with_link_length(mut self, link_length: f64) -> Self {
        self.link_length = link_length;
        self
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    /// Base of the first link
    pub fn base(&self) -> (f64, f64) {
        (self.grid.x_size() as f64 / 2.0, 0.0)
    }

    /// Joint positions from the base to the end effector
    pub fn joint_positions(&self, angles: &State) -> Vec<(f64, f64)> {
        let mut points = Vec::with_capacity(angles.len() + 1);
        let (mut x, mut y) = self.base();
        points.push((x, y));
        for &angle in angles.iter() {
            x += self.link_length * angle.cos();
            y += self.link_length * angle.sin();
            points.push((x, y));
        }
        points
    }
}

impl ValidityChecker for ArmValidityChecker {
    fn is_valid(&self, state: &State) -> bool {
        if !is_finite(state) {
            return false;
        }
        self.joint_positions(state)
            .windows(2)
            .all(|link| self.grid.is_valid_segment(link[0].0, link[0].1, link[1].0, link[1].1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wrap_angle() {
        assert_relative_eq!(wrap_angle(0.5), 0.5);
        assert_relative_eq!(wrap_angle(3.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(-3.0 * PI / 2.0), PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(PI), PI);
        assert_relative_eq!(wrap_angle(-PI), PI);
    }

    #[test]
    fn test_difference_takes_short_way_round() {
        let arm = PlanarArm::new(2);
        let a = State::from_vec(vec![0.1, 6.2]);
        let b = State::from_vec(vec![6.2, 0.1]);
        let d = arm.difference(&a, &b);
        assert!(d[0] > 0.0 && d[0] < 0.3);
        assert!(d[1] < 0.0 && d[1] > -0.3);
    }

    #[test]
    fn test_joint_positions() {
        let checker = ArmValidityChecker::new(OccupancyGrid::empty(40, 30).unwrap());
        let points = checker.joint_positions(&State::from_vec(vec![PI / 2.0, 0.0]));
        assert_eq!(points.len(), 3);
        assert_relative_eq!(points[1].0, 20.0, epsilon = 1e-12);
        assert_relative_eq!(points[1].1, 10.0, epsilon = 1e-12);
        assert_relative_eq!(points[2].0, 30.0, epsilon = 1e-12);
    }

    #[test]
    fn test_validity_against_grid() {
        let mut grid = OccupancyGrid::empty(40, 30).unwrap();
        // block cell column x = 20 around y = 15
        for y in 14..17 {
            grid.set_occupied(20, y, true);
        }
        let checker = ArmValidityChecker::new(grid);

        // straight up crosses the block
        assert!(!checker.is_valid(&State::from_vec(vec![PI / 2.0, PI / 2.0])));
        // bent to the right avoids it
        assert!(checker.is_valid(&State::from_vec(vec![PI / 2.0, 0.0])));
        // pointing below the base leaves the grid
        assert!(!checker.is_valid(&State::from_vec(vec![-PI / 2.0, 0.0])));
        assert!(!checker.is_valid(&State::from_vec(vec![f64::NAN, 0.0])));
    }

    #[test]
    fn test_kinematics_are_linear() {
        let arm = PlanarArm::new(3);
        let u = Control::from_vec(vec![0.1, -0.2, 0.3]);
        assert_eq!(arm.derivative(&State::zeros(3), &u), u);
        let (a, b) = arm.linearize(&State::zeros(3), &u);
        assert_eq!(a, DMatrix::zeros(3, 3));
        assert_eq!(b, DMatrix::identity(3, 3));
    }
}
