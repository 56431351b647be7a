//! N-axis double integrator: `ṗ = v`, `v̇ = u`
//!
//! Linear, so the first-order discretization is exact. Used as the stable
//! linear reference system for the LQR and planner tests.

use nalgebra::DMatrix;

use crate::common::{Control, Dynamics, State};

#[derive(Debug, Clone, Copy)]
pub struct DoubleIntegrator {
    axes: usize,
}

impl DoubleIntegrator {
    /// State layout `[p_1..p_n, v_1..v_n]`, control `[a_1..a_n]`
    pub fn new(axes: usize) -> Self {
        DoubleIntegrator { axes }
    }

    pub fn axes(&self) -> usize {
        self.axes
    }
}

impl Dynamics for DoubleIntegrator {
    fn state_dim(&self) -> usize {
        2 * self.axes
    }

    fn control_dim(&self) -> usize {
        self.axes
    }

    fn derivative(&self, state: &State, control: &Control) -> State {
        let n = self.axes;
        let mut dx = State::zeros(2 * n);
        dx.rows_mut(0, n).copy_from(&state.rows(n, n));
        dx.rows_mut(n, n).copy_from(control);
        dx
    }

    fn linearize(&self, _state: &State, _control: &Control) -> (DMatrix<f64>, DMatrix<f64>) {
        let n = self.axes;
        let mut a = DMatrix::zeros(2 * n, 2 * n);
        let mut b = DMatrix::zeros(2 * n, n);
        for i in 0..n {
            a[(i, n + i)] = 1.0;
            b[(n + i, i)] = 1.0;
        }
        (a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::finite_difference_jacobians;
    use approx::assert_relative_eq;

    #[test]
    fn test_derivative() {
        let dynamics = DoubleIntegrator::new(2);
        let x = State::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        let u = Control::from_vec(vec![-1.0, 0.5]);
        let dx = dynamics.derivative(&x, &u);
        assert_eq!(dx.as_slice(), &[3.0, 4.0, -1.0, 0.5]);
    }

    #[test]
    fn test_linearize_matches_finite_differences() {
        let dynamics = DoubleIntegrator::new(2);
        let x = State::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        let u = Control::from_vec(vec![-1.0, 0.5]);
        let (a, b) = dynamics.linearize(&x, &u);
        let (a_fd, b_fd) = finite_difference_jacobians(|x, u| dynamics.derivative(x, u), &x, &u);
        assert_relative_eq!(a, a_fd, epsilon = 1e-6);
        assert_relative_eq!(b, b_fd, epsilon = 1e-6);
    }
}
