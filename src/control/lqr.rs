//! Discrete-time LQR solver
//!
//! Fixed-point Riccati recursion
//! `S⁺ = Q + AᵀSA − AᵀSB (R + BᵀSB)⁻¹ BᵀSA`, seeded with `S₀ = Q`, and the
//! matching feedback gain `K = (R + BᵀSB)⁻¹ BᵀSA`. The cost-to-go `S`
//! doubles as the planner's distance metric, so it is kept symmetric
//! after every update.

use nalgebra::DMatrix;
use thiserror::Error;

/// Failure of a single LQR solve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LqrError {
    /// `R + BᵀSB` could not be inverted
    #[error("R + BᵀSB is singular")]
    Singular,
    /// The recursion left the finite range or exceeded the divergence bound
    #[error("Riccati recursion diverged")]
    Diverged,
}

/// Converged (or capped) LQR solution
#[derive(Debug, Clone)]
pub struct LqrSolution {
    /// Feedback gain, `u = −K (x − x_ref)`
    pub k: DMatrix<f64>,
    /// Cost-to-go matrix
    pub s: DMatrix<f64>,
    /// Number of Riccati updates performed
    pub iterations: usize,
    /// False when the iteration cap was hit first
    pub converged: bool,
}

/// Riccati-recursion LQR solver
#[derive(Debug, Clone)]
pub struct LqrSolver {
    q: DMatrix<f64>,
    r: DMatrix<f64>,
    tolerance: f64,
    max_iterations: usize,
    divergence_bound: f64,
}

impl LqrSolver {
    /// Create a solver with state weight `q` and control weight `r`
    pub fn new(q: DMatrix<f64>, r: DMatrix<f64>) -> Self {
        LqrSolver {
            q,
            r,
            tolerance: 1e-6,
            max_iterations: 1000,
            divergence_bound: 1e12,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_divergence_bound(mut self, bound: f64) -> Self {
        self.divergence_bound = bound;
        self
    }

    pub fn q(&self) -> &DMatrix<f64> {
        &self.q
    }

    pub fn r(&self) -> &DMatrix<f64> {
        &self.r
    }

    /// Solve for `(ad, bd)` starting from `S₀ = Q`
    pub fn solve(&self, ad: &DMatrix<f64>, bd: &DMatrix<f64>) -> Result<LqrSolution, LqrError> {
        self.solve_from(ad, bd, self.q.clone())
    }

    /// Solve starting the recursion from an arbitrary symmetric seed
    pub fn solve_from(
        &self,
        ad: &DMatrix<f64>,
        bd: &DMatrix<f64>,
        seed: DMatrix<f64>,
    ) -> Result<LqrSolution, LqrError> {
        let mut s = symmetrize(&seed);
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            let next = self.riccati_step(ad, bd, &s)?;
            iterations += 1;

            let norm = next.norm();
            if !norm.is_finite() || norm > self.divergence_bound {
                return Err(LqrError::Diverged);
            }

            let delta = (&next - &s).norm();
            s = next;
            if delta < self.tolerance {
                converged = true;
                break;
            }
        }

        let k = self.gain(ad, bd, &s)?;
        Ok(LqrSolution {
            k,
            s,
            iterations,
            converged,
        })
    }

    /// Feedback gain for a given cost-to-go
    pub fn gain(
        &self,
        ad: &DMatrix<f64>,
        bd: &DMatrix<f64>,
        s: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>, LqrError> {
        let bt_s = bd.transpose() * s;
        let inv = self.inverse_gram(bd, &bt_s)?;
        let k = inv * bt_s * ad;
        if k.iter().any(|v| !v.is_finite()) {
            return Err(LqrError::Diverged);
        }
        Ok(k)
    }

    /// Frobenius norm of `S − F(S)`, where `F` is one Riccati update
    pub fn riccati_residual(
        &self,
        ad: &DMatrix<f64>,
        bd: &DMatrix<f64>,
        s: &DMatrix<f64>,
    ) -> Result<f64, LqrError> {
        Ok((self.riccati_step(ad, bd, s)? - s).norm())
    }

    fn riccati_step(
        &self,
        ad: &DMatrix<f64>,
        bd: &DMatrix<f64>,
        s: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>, LqrError> {
        let bt_s = bd.transpose() * s;
        let inv = self.inverse_gram(bd, &bt_s)?;
        let at_s = ad.transpose() * s;
        let next = &self.q + &at_s * ad - &at_s * bd * inv * bt_s * ad;
        Ok(symmetrize(&next))
    }

    /// `(R + BᵀSB)⁻¹`
    fn inverse_gram(&self, bd: &DMatrix<f64>, bt_s: &DMatrix<f64>) -> Result<DMatrix<f64>, LqrError> {
        let gram = &self.r + bt_s * bd;
        let inv = gram.try_inverse().ok_or(LqrError::Singular)?;
        if inv.iter().any(|v| !v.is_finite()) {
            return Err(LqrError::Singular);
        }
        Ok(inv)
    }
}

/// `(M + Mᵀ) / 2`
pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    (m + m.transpose()) * 0.5
}

/// Proportional gain used when the LQR solve fails: `K = g · Bd⁺`.
/// Falls back to a zero gain if the pseudo-inverse cannot be formed.
pub fn fallback_gain(bd: &DMatrix<f64>, gain: f64) -> DMatrix<f64> {
    match bd.clone().pseudo_inverse(1e-12) {
        Ok(pinv) if pinv.iter().all(|v| v.is_finite()) => pinv * gain,
        _ => DMatrix::zeros(bd.ncols(), bd.nrows()),
    }
}
