//! Control algorithms module
//!
//! Linearization/discretization of the dynamics and the LQR solver used
//! for steering and for the planner's distance metric.

pub mod linearization;
pub mod lqr;

pub use linearization::{discretize, finite_difference_jacobians, DiscreteLinearization};
pub use lqr::{fallback_gain, symmetrize, LqrError, LqrSolution, LqrSolver};
