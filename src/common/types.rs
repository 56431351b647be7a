//! Common types used throughout lqr_rrt_star

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::common::error::{PlannerError, PlannerResult};

/// State vector. Dimension and meaning are fixed by the dynamics provider.
pub type State = DVector<f64>;

/// Control vector (e.g. commanded acceleration).
pub type Control = DVector<f64>;

/// Sequence of (state, control) pairs
pub type Trajectory = Vec<(State, Control)>;

/// Quadratic form `vᵀ M v`
pub fn quadratic_form(v: &DVector<f64>, m: &DMatrix<f64>) -> f64 {
    v.dot(&(m * v))
}

/// True when every entry of the vector is finite
pub fn is_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// Per-dimension sampling bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl SampleBounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self { lower, upper }
    }

    /// Same interval on every dimension
    pub fn uniform(dim: usize, min: f64, max: f64) -> Self {
        Self {
            lower: vec![min; dim],
            upper: vec![max; dim],
        }
    }

    /// Build from (min, max) pairs
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        Self {
            lower: pairs.iter().map(|p| p.0).collect(),
            upper: pairs.iter().map(|p| p.1).collect(),
        }
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    pub fn contains(&self, state: &State) -> bool {
        state.len() == self.dim()
            && state
                .iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .all(|(&x, (&lo, &hi))| x >= lo && x <= hi)
    }

    /// Clamp every component of `state` into the bounds
    pub fn clamp(&self, state: &mut State) {
        for (i, x) in state.iter_mut().enumerate() {
            *x = x.clamp(self.lower[i], self.upper[i]);
        }
    }

    pub fn validate(&self, state_dim: usize) -> PlannerResult<()> {
        if self.lower.len() != state_dim {
            return Err(PlannerError::dimension("sample bounds (lower)", state_dim, self.lower.len()));
        }
        if self.upper.len() != state_dim {
            return Err(PlannerError::dimension("sample bounds (upper)", state_dim, self.upper.len()));
        }
        for (i, (lo, hi)) in self.lower.iter().zip(self.upper.iter()).enumerate() {
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                return Err(PlannerError::InvalidParameter(format!(
                    "sample bounds for dimension {} are invalid: [{}, {}]",
                    i, lo, hi
                )));
            }
        }
        Ok(())
    }
}
