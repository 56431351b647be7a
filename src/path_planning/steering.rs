//! LQR steering
//!
//! Linearize at the node being extended, solve the infinite-horizon LQR for
//! the discretized pair and roll the closed loop `u = −K (x − target)` forward
//! with explicit Euler steps until the cost-to-go metric drops below the
//! tolerance, the step budget runs out, or the validity checker rejects a
//! state.

use nalgebra::DMatrix;
use tracing::warn;

use crate::common::{
    is_finite, quadratic_form, Control, Dynamics, PlannerError, PlannerResult, State, Trajectory,
    ValidityChecker,
};
use crate::control::{discretize, fallback_gain, LqrError, LqrSolver};
use crate::path_planning::config::PlannerConfig;

/// Result kind of one steering attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteerOutcome {
    /// The metric tolerance was met
    Reached,
    /// At least one valid step was taken but the target was not reached
    Advanced,
    /// The very first step was invalid, nothing to insert
    Trapped,
}

#[derive(Debug, Clone)]
pub struct SteerResult {
    pub outcome: SteerOutcome,
    /// Last valid state (the start state when no step was taken)
    pub state: State,
    /// Control applied on the last step
    pub control: Control,
    /// `Σ dt (eᵀQe + uᵀRu)` over the realized steps
    pub edge_cost: f64,
    /// `(x_{k+1}, u_k)` for every realized step
    pub trajectory: Trajectory,
    /// The LQR solve failed and the proportional fallback was used
    pub used_fallback: bool,
}

impl SteerResult {
    pub fn is_trapped(&self) -> bool {
        self.outcome == SteerOutcome::Trapped
    }

    pub fn is_reached(&self) -> bool {
        self.outcome == SteerOutcome::Reached
    }
}

/// Local feedback law and cost-to-go around one linearization point
#[derive(Debug, Clone)]
pub struct LocalController {
    pub k: DMatrix<f64>,
    pub s: DMatrix<f64>,
    /// Why the LQR solve failed, if it did
    pub failure: Option<LqrError>,
}

impl LocalController {
    pub fn used_fallback(&self) -> bool {
        self.failure.is_some()
    }
}

/// Quadratic distance `dᵀ S d` with `S` taken at one query point
#[derive(Debug, Clone)]
pub struct QuadraticMetric {
    pub s: DMatrix<f64>,
    pub used_fallback: bool,
}

impl QuadraticMetric {
    pub fn euclidean(dim: usize) -> Self {
        QuadraticMetric {
            s: DMatrix::identity(dim, dim),
            used_fallback: true,
        }
    }

    /// Cost-to-go from `from` to `to`
    pub fn distance<D: Dynamics + ?Sized>(&self, dynamics: &D, from: &State, to: &State) -> f64 {
        quadratic_form(&dynamics.difference(from, to), &self.s)
    }
}

/// Steering parameters shared by every attempt of one planner
#[derive(Debug, Clone)]
pub struct Steering {
    solver: LqrSolver,
    dt: f64,
    max_steps: usize,
    tolerance: f64,
    fallback_gain: f64,
}

impl Steering {
    pub fn new(solver: LqrSolver, dt: f64, max_steps: usize, tolerance: f64, fallback_gain: f64) -> Self {
        Steering {
            solver,
            dt,
            max_steps,
            tolerance,
            fallback_gain,
        }
    }

    pub fn from_config(config: &PlannerConfig, q: DMatrix<f64>, r: DMatrix<f64>) -> Self {
        let solver = LqrSolver::new(q, r)
            .with_tolerance(config.lqr_tolerance)
            .with_max_iterations(config.lqr_max_iterations)
            .with_divergence_bound(config.lqr_divergence_bound);
        Self::new(
            solver,
            config.dt,
            config.max_steps,
            config.steer_tolerance,
            config.fallback_gain,
        )
    }

    pub fn solver(&self) -> &LqrSolver {
        &self.solver
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Solve the LQR around `(state, control)`. A failed solve is not an
    /// error: the controller carries the proportional fallback gain and an
    /// identity cost-to-go.
    pub fn local_controller<D: Dynamics + ?Sized>(
        &self,
        dynamics: &D,
        state: &State,
        control: &Control,
    ) -> PlannerResult<LocalController> {
        let lin = discretize(dynamics, state, control, self.dt)?;
        match self.solver.solve(&lin.ad, &lin.bd) {
            Ok(sol) => Ok(LocalController {
                k: sol.k,
                s: sol.s,
                failure: None,
            }),
            Err(err) => {
                warn!(error = %err, "LQR solve failed, using proportional fallback");
                let n = dynamics.state_dim();
                Ok(LocalController {
                    k: fallback_gain(&lin.bd, self.fallback_gain),
                    s: DMatrix::identity(n, n),
                    failure: Some(err),
                })
            }
        }
    }

    /// Metric for nearest/near queries, linearized at `query` with zero control
    pub fn metric<D: Dynamics + ?Sized>(&self, dynamics: &D, query: &State) -> PlannerResult<QuadraticMetric> {
        let controller = self.local_controller(dynamics, query, &dynamics.zero_control())?;
        Ok(QuadraticMetric {
            used_fallback: controller.used_fallback(),
            s: controller.s,
        })
    }

    /// Running cost of one step
    pub fn running_cost(&self, error: &State, control: &Control) -> f64 {
        self.dt * (quadratic_form(error, self.solver.q()) + quadratic_form(control, self.solver.r()))
    }

    /// Steer from `(from, from_control)` toward `target`.
    ///
    /// Non-finite states produced by the dynamics are an error, everything
    /// else is reported through [`SteerOutcome`].
    pub fn steer<D, V>(
        &self,
        dynamics: &D,
        validity: &V,
        from: &State,
        from_control: &Control,
        target: &State,
    ) -> PlannerResult<SteerResult>
    where
        D: Dynamics + ?Sized,
        V: ValidityChecker + ?Sized,
    {
        let controller = self.local_controller(dynamics, from, from_control)?;

        let mut x = from.clone();
        let mut last_control = dynamics.zero_control();
        let mut edge_cost = 0.0;
        let mut trajectory = Trajectory::new();
        let mut outcome = SteerOutcome::Advanced;

        for step in 0..=self.max_steps {
            let error = dynamics.difference(&x, target);
            if quadratic_form(&error, &controller.s) < self.tolerance {
                outcome = SteerOutcome::Reached;
                break;
            }
            if step == self.max_steps {
                break;
            }

            let u = -(&controller.k * &error);
            let next = &x + dynamics.derivative(&x, &u) * self.dt;
            if !is_finite(&next) {
                return Err(PlannerError::NonFiniteDynamics(format!(
                    "integration from {:?} produced {:?}",
                    x.as_slice(),
                    next.as_slice()
                )));
            }
            if !validity.is_valid(&next) {
                if trajectory.is_empty() {
                    outcome = SteerOutcome::Trapped;
                }
                break;
            }

            edge_cost += self.running_cost(&error, &u);
            trajectory.push((next.clone(), u.clone()));
            x = next;
            last_control = u;
        }

        Ok(SteerResult {
            outcome,
            state: x,
            control: last_control,
            edge_cost,
            trajectory,
            used_fallback: controller.used_fallback(),
        })
    }
}
