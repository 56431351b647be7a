//! Capability traits the planner is generic over

use nalgebra::DMatrix;

use crate::common::types::*;
use crate::control::linearization::finite_difference_jacobians;

/// Continuous-time controlled dynamical system `ẋ = f(x, u)`
pub trait Dynamics {
    /// Dimension of the state vector
    fn state_dim(&self) -> usize;

    /// Dimension of the control vector
    fn control_dim(&self) -> usize;

    /// State derivative `f(x, u)`
    fn derivative(&self, state: &State, control: &Control) -> State;

    /// Jacobians `(∂f/∂x, ∂f/∂u)` at `(state, control)`.
    ///
    /// Defaults to central finite differences of [`Dynamics::derivative`].
    fn linearize(&self, state: &State, control: &Control) -> (DMatrix<f64>, DMatrix<f64>) {
        finite_difference_jacobians(|x, u| self.derivative(x, u), state, control)
    }

    /// Difference `a ⊖ b` used by the metric and the controller.
    /// Override for wrapped coordinates such as joint angles.
    fn difference(&self, a: &State, b: &State) -> State {
        a - b
    }

    /// Zero control of the right dimension
    fn zero_control(&self) -> Control {
        Control::zeros(self.control_dim())
    }
}

/// Collision / bounds check for a single state
pub trait ValidityChecker {
    fn is_valid(&self, state: &State) -> bool;
}

impl<F> ValidityChecker for F
where
    F: Fn(&State) -> bool,
{
    fn is_valid(&self, state: &State) -> bool {
        self(state)
    }
}

/// Validity checker that accepts every finite state
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysValid;

impl ValidityChecker for AlwaysValid {
    fn is_valid(&self, state: &State) -> bool {
        is_finite(state)
    }
}

/// Accepts states inside an axis-aligned box
#[derive(Debug, Clone)]
pub struct BoxBounds {
    pub bounds: SampleBounds,
}

impl BoxBounds {
    pub fn new(bounds: SampleBounds) -> Self {
        Self { bounds }
    }
}

impl ValidityChecker for BoxBounds {
    fn is_valid(&self, state: &State) -> bool {
        self.bounds.contains(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pendulum;

    impl Dynamics for Pendulum {
        fn state_dim(&self) -> usize {
            2
        }

        fn control_dim(&self) -> usize {
            1
        }

        fn derivative(&self, state: &State, control: &Control) -> State {
            State::from_vec(vec![state[1], -state[0].sin() + control[0]])
        }
    }

    #[test]
    fn test_default_linearize_uses_finite_differences() {
        let (a, b) = Pendulum.linearize(&State::from_vec(vec![0.0, 0.0]), &Control::zeros(1));
        assert!((a[(0, 1)] - 1.0).abs() < 1e-6);
        assert!((a[(1, 0)] + 1.0).abs() < 1e-6);
        assert!((b[(1, 0)] - 1.0).abs() < 1e-6);
        assert!(b[(0, 0)].abs() < 1e-6);
    }

    #[test]
    fn test_closure_validity_checker() {
        let positive = |s: &State| s[0] > 0.0;
        assert!(positive.is_valid(&State::from_vec(vec![1.0])));
        assert!(!positive.is_valid(&State::from_vec(vec![-1.0])));
    }

    #[test]
    fn test_always_valid_rejects_nan() {
        assert!(AlwaysValid.is_valid(&State::from_vec(vec![0.0, 1.0])));
        assert!(!AlwaysValid.is_valid(&State::from_vec(vec![f64::NAN])));
    }
}
