//! Clohessy–Wiltshire relative motion
//!
//! Linearized motion of a chaser relative to a target on a circular orbit,
//! expressed in the target's LVLH frame (x radial, y along-track, z
//! cross-track). Valid while the separation is small compared to the
//! orbital radius.

use nalgebra::DMatrix;

use crate::common::{Control, Dynamics, State};

#[derive(Debug, Clone, Copy)]
pub struct ClohessyWiltshire {
    mean_motion: f64,
}

impl ClohessyWiltshire {
    pub fn new(mean_motion: f64) -> Self {
        ClohessyWiltshire { mean_motion }
    }

    /// Mean motion `n = sqrt(μ / a³)` of the reference orbit
    pub fn from_semi_major_axis(mu: f64, semi_major_axis: f64) -> Self {
        Self::new((mu / semi_major_axis.powi(3)).sqrt())
    }

    pub fn mean_motion(&self) -> f64 {
        self.mean_motion
    }
}

impl Dynamics for ClohessyWiltshire {
    fn state_dim(&self) -> usize {
        6
    }

    fn control_dim(&self) -> usize {
        3
    }

    fn derivative(&self, state: &State, control: &Control) -> State {
        let (a, b) = self.linearize(state, control);
        a * state + b * control
    }

    fn linearize(&self, _state: &State, _control: &Control) -> (DMatrix<f64>, DMatrix<f64>) {
        let n = self.mean_motion;
        let mut a = DMatrix::zeros(6, 6);
        let mut b = DMatrix::zeros(6, 3);
        for i in 0..3 {
            a[(i, i + 3)] = 1.0;
            b[(i + 3, i)] = 1.0;
        }
        a[(3, 0)] = 3.0 * n * n;
        a[(3, 4)] = 2.0 * n;
        a[(4, 3)] = -2.0 * n;
        a[(5, 2)] = -n * n;
        (a, b)
    }
}
