//! Two-body (central gravity) dynamics with acceleration control
//!
//! State `[r, v]`, control is an acceleration:
//! `ṙ = v`, `v̇ = −μ r / |r|³ + u`.
//! Spatial (3 axes) and planar (2 axes) variants share the same code.

use nalgebra::DMatrix;

use crate::common::{is_finite, Control, Dynamics, State, ValidityChecker};

/// Earth gravitational parameter [km^3/s^2]
pub const MU_EARTH: f64 = 398_600.4418;

/// Earth equatorial radius [km]
pub const EARTH_RADIUS: f64 = 6378.137;

#[derive(Debug, Clone, Copy)]
pub struct CentralBody {
    mu: f64,
    axes: usize,
}

impl CentralBody {
    /// Spatial central body (6 states, 3 controls)
    pub fn new(mu: f64) -> Self {
        CentralBody { mu, axes: 3 }
    }

    /// Planar central body (4 states, 2 controls)
    pub fn planar(mu: f64) -> Self {
        CentralBody { mu, axes: 2 }
    }

    /// Spatial Earth model in km and seconds
    pub fn earth() -> Self {
        Self::new(MU_EARTH)
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    /// Gravitational acceleration at position `r`
    pub fn gravity(&self, r: &State) -> State {
        let norm = r.norm();
        r * (-self.mu / norm.powi(3))
    }
}

impl Dynamics for CentralBody {
    fn state_dim(&self) -> usize {
        2 * self.axes
    }

    fn control_dim(&self) -> usize {
        self.axes
    }

    fn derivative(&self, state: &State, control: &Control) -> State {
        let n = self.axes;
        let r = state.rows(0, n).into_owned();
        let mut dx = State::zeros(2 * n);
        dx.rows_mut(0, n).copy_from(&state.rows(n, n));
        dx.rows_mut(n, n).copy_from(&(self.gravity(&r) + control));
        dx
    }

    fn linearize(&self, state: &State, _control: &Control) -> (DMatrix<f64>, DMatrix<f64>) {
        let n = self.axes;
        let r = state.rows(0, n).into_owned();
        let norm = r.norm();

        // ∂a/∂r = −μ/|r|³ (I − 3 r rᵀ / |r|²)
        let gradient = (DMatrix::identity(n, n) - (&r * r.transpose()) * (3.0 / (norm * norm)))
            * (-self.mu / norm.powi(3));

        let mut a = DMatrix::zeros(2 * n, 2 * n);
        let mut b = DMatrix::zeros(2 * n, n);
        for i in 0..n {
            a[(i, n + i)] = 1.0;
            b[(n + i, i)] = 1.0;
        }
        a.view_mut((n, 0), (n, n)).copy_from(&gradient);
        (a, b)
    }
}

/// Keeps the spacecraft between two radii (no re-entry, no escape box)
#[derive(Debug, Clone, Copy)]
pub struct RadiusLimits {
    pub min_radius: f64,
    pub max_radius: f64,
    axes: usize,
}

impl RadiusLimits {
    pub fn new(min_radius: f64, max_radius: f64) -> Self {
        RadiusLimits {
            min_radius,
            max_radius,
            axes: 3,
        }
    }

    pub fn planar(min_radius: f64, max_radius: f64) -> Self {
        RadiusLimits {
            min_radius,
            max_radius,
            axes: 2,
        }
    }

    /// Altitude band above the Earth in km
    pub fn earth_altitude(min_altitude: f64, max_altitude: f64) -> Self {
        Self::new(EARTH_RADIUS + min_altitude, EARTH_RADIUS + max_altitude)
    }
}

impl ValidityChecker for RadiusLimits {
    fn is_valid(&self, state: &State) -> bool {
        if state.len() < self.axes || !is_finite(state) {
            return false;
        }
        let r = state.rows(0, self.axes).norm();
        r >= self.min_radius && r <= self.max_radius
    }
}
