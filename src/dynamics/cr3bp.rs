//! Circular restricted three-body problem (CR3BP)
//!
//! Nondimensional rotating frame: primaries at `(−μ, 0, 0)` and
//! `(1 − μ, 0, 0)`, unit angular rate. Control is an acceleration.
//! Jacobians come from the default finite-difference linearization.

use crate::common::{Control, Dynamics, State};

/// Earth–Moon mass ratio
pub const EARTH_MOON_MASS_RATIO: f64 = 0.012_150_585_609_624;

#[derive(Debug, Clone, Copy)]
pub struct Cr3bp {
    mass_ratio: f64,
}

impl Cr3bp {
    pub fn new(mass_ratio: f64) -> Self {
        Cr3bp { mass_ratio }
    }

    pub fn earth_moon() -> Self {
        Self::new(EARTH_MOON_MASS_RATIO)
    }

    pub fn mass_ratio(&self) -> f64 {
        self.mass_ratio
    }

    /// Jacobi constant `C = 2Ω − v²` of a state (no control)
    pub fn jacobi_constant(&self, state: &State) -> f64 {
        let mu = self.mass_ratio;
        let (x, y, z) = (state[0], state[1], state[2]);
        let r1 = ((x + mu).powi(2) + y * y + z * z).sqrt();
        let r2 = ((x - 1.0 + mu).powi(2) + y * y + z * z).sqrt();
        let omega = 0.5 * (x * x + y * y) + (1.0 - mu) / r1 + mu / r2;
        let v2 = state[3].powi(2) + state[4].powi(2) + state[5].powi(2);
        2.0 * omega - v2
    }
}

impl Dynamics for Cr3bp {
    fn state_dim(&self) -> usize {
        6
    }

    fn control_dim(&self) -> usize {
        3
    }

    fn derivative(&self, state: &State, control: &Control) -> State {
        let mu = self.mass_ratio;
        let (x, y, z) = (state[0], state[1], state[2]);
        let (vx, vy, vz) = (state[3], state[4], state[5]);

        let r1_3 = ((x + mu).powi(2) + y * y + z * z).powf(1.5);
        let r2_3 = ((x - 1.0 + mu).powi(2) + y * y + z * z).powf(1.5);

        let ax = 2.0 * vy + x - (1.0 - mu) * (x + mu) / r1_3 - mu * (x - 1.0 + mu) / r2_3;
        let ay = -2.0 * vx + y - (1.0 - mu) * y / r1_3 - mu * y / r2_3;
        let az = -(1.0 - mu) * z / r1_3 - mu * z / r2_3;

        State::from_vec(vec![
            vx,
            vy,
            vz,
            ax + control[0],
            ay + control[1],
            az + control[2],
        ])
    }
}
