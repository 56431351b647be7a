//! Linearization and discretization of continuous dynamics
//!
//! The LQR solver works on a discrete-time pair `(Ad, Bd)`. It is obtained
//! from the continuous Jacobians with a first-order hold:
//! `Ad = I + A·dt`, `Bd = B·dt`.

use nalgebra::DMatrix;

use crate::common::{Control, Dynamics, PlannerError, PlannerResult, State};

/// Discrete-time linear model around a reference point
#[derive(Debug, Clone)]
pub struct DiscreteLinearization {
    pub ad: DMatrix<f64>,
    pub bd: DMatrix<f64>,
}

/// Linearize `dynamics` at `(state, control)` and discretize with step `dt`.
///
/// Non-finite Jacobians mean the model itself is broken and are reported
/// as [`PlannerError::NonFiniteDynamics`].
pub fn discretize<D: Dynamics + ?Sized>(
    dynamics: &D,
    state: &State,
    control: &Control,
    dt: f64,
) -> PlannerResult<DiscreteLinearization> {
    let n = dynamics.state_dim();
    let m = dynamics.control_dim();
    let (a, b) = dynamics.linearize(state, control);

    if a.shape() != (n, n) {
        return Err(PlannerError::dimension("state Jacobian rows", n, a.nrows()));
    }
    if b.shape() != (n, m) {
        return Err(PlannerError::dimension("control Jacobian columns", m, b.ncols()));
    }
    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return Err(PlannerError::NonFiniteDynamics(format!(
            "Jacobian at state {:?} is not finite",
            state.as_slice()
        )));
    }

    Ok(DiscreteLinearization {
        ad: DMatrix::identity(n, n) + a * dt,
        bd: b * dt,
    })
}

/// Central finite-difference Jacobians of `f` at `(x, u)`
pub fn finite_difference_jacobians<F>(f: F, x: &State, u: &Control) -> (DMatrix<f64>, DMatrix<f64>)
where
    F: Fn(&State, &Control) -> State,
{
    let f0 = f(x, u);
    let n = f0.len();
    let mut a = DMatrix::zeros(n, x.len());
    let mut b = DMatrix::zeros(n, u.len());

    for j in 0..x.len() {
        let h = 1e-6 * x[j].abs().max(1.0);
        let mut xp = x.clone();
        let mut xm = x.clone();
        xp[j] += h;
        xm[j] -= h;
        let col = (f(&xp, u) - f(&xm, u)) / (2.0 * h);
        a.set_column(j, &col);
    }

    for j in 0..u.len() {
        let h = 1e-6 * u[j].abs().max(1.0);
        let mut up = u.clone();
        let mut um = u.clone();
        up[j] += h;
        um[j] -= h;
        let col = (f(x, &up) - f(x, &um)) / (2.0 * h);
        b.set_column(j, &col);
    }

    (a, b)
}
