//! Planner configuration
//!
//! Every option is a plain field with a default, so a TOML file only needs
//! to name what differs. Dimensions are checked against the dynamics when
//! the planner is built, never while it is iterating.

use std::path::Path;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::common::{PlannerError, PlannerResult, SampleBounds};

/// How the near set for choose-parent and rewire is selected
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Neighborhood {
    /// Every node within this metric distance
    Radius(f64),
    /// The `k` closest nodes
    KNearest(usize),
}

/// Configuration for the LQR-RRT* planner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Expected state dimension; checked against the dynamics when set
    pub state_dim: Option<usize>,
    /// Expected control dimension; checked against the dynamics when set
    pub control_dim: Option<usize>,
    /// Per-dimension uniform sampling bounds
    pub sample_bounds: SampleBounds,
    /// Diagonal of the state weight Q (empty means identity)
    pub q_diag: Vec<f64>,
    /// Diagonal of the control weight R (empty means identity)
    pub r_diag: Vec<f64>,
    /// Goal tolerance (Euclidean, over `goal_dimensions`)
    pub goal_tolerance: f64,
    /// State indices the goal test looks at; all of them when unset
    pub goal_dimensions: Option<Vec<usize>>,
    /// Probability of sampling the goal state
    pub p_goal: f64,
    /// Probability of sampling around a reference node
    pub p_local: f64,
    /// Perturbation magnitude interval `[r_min, r_max]` for local samples
    pub local_radius: [f64; 2],
    /// Integration step [s]
    pub dt: f64,
    /// Maximum integration steps per steering attempt
    pub max_steps: usize,
    /// Metric distance at which a steer counts as reached
    pub steer_tolerance: f64,
    /// Riccati convergence tolerance
    pub lqr_tolerance: f64,
    /// Riccati iteration cap
    pub lqr_max_iterations: usize,
    /// Cost-to-go norm treated as divergence
    pub lqr_divergence_bound: f64,
    /// Proportional gain used when the LQR solve fails
    pub fallback_gain: f64,
    pub neighborhood: Neighborhood,
    /// Iteration budget for `plan`
    pub max_iterations: usize,
    /// Wall-clock budget for `plan` [s]
    pub max_duration_secs: Option<f64>,
    /// Stop `plan` as soon as a first path exists
    pub stop_at_first_path: bool,
    /// Try a single start to goal steer on the first iteration
    pub attempt_direct_connection: bool,
    /// Random seed, 0 draws one from the OS
    pub seed: u64,
    #[serde(skip)]
    q_full: Option<DMatrix<f64>>,
    #[serde(skip)]
    r_full: Option<DMatrix<f64>>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            state_dim: None,
            control_dim: None,
            sample_bounds: SampleBounds::new(Vec::new(), Vec::new()),
            q_diag: Vec::new(),
            r_diag: Vec::new(),
            goal_tolerance: 0.5,
            goal_dimensions: None,
            p_goal: 0.2,
            p_local: 0.2,
            local_radius: [0.1, 0.5],
            dt: 0.1,
            max_steps: 80,
            steer_tolerance: 1e-3,
            lqr_tolerance: 1e-6,
            lqr_max_iterations: 1000,
            lqr_divergence_bound: 1e12,
            fallback_gain: 0.5,
            neighborhood: Neighborhood::KNearest(10),
            max_iterations: 10_000,
            max_duration_secs: None,
            stop_at_first_path: false,
            attempt_direct_connection: true,
            seed: 0,
            q_full: None,
            r_full: None,
        }
    }
}

impl PlannerConfig {
    pub fn new(sample_bounds: SampleBounds) -> Self {
        Self {
            sample_bounds,
            ..Default::default()
        }
    }

    pub fn from_toml_str(text: &str) -> PlannerResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> PlannerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Use full weight matrices instead of the diagonals
    pub fn with_weights(mut self, q: DMatrix<f64>, r: DMatrix<f64>) -> Self {
        self.q_full = Some(q);
        self.r_full = Some(r);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// State weight Q for a state of dimension `n`
    pub fn q_matrix(&self, n: usize) -> DMatrix<f64> {
        weight_matrix(self.q_full.as_ref(), &self.q_diag, n)
    }

    /// Control weight R for a control of dimension `m`
    pub fn r_matrix(&self, m: usize) -> DMatrix<f64> {
        weight_matrix(self.r_full.as_ref(), &self.r_diag, m)
    }

    /// Indices used by the goal test
    pub fn goal_indices(&self, state_dim: usize) -> Vec<usize> {
        match &self.goal_dimensions {
            Some(dims) => dims.clone(),
            None => (0..state_dim).collect(),
        }
    }

    /// Check the configuration against the planning problem dimensions
    pub fn validate(&self, state_dim: usize, control_dim: usize) -> PlannerResult<()> {
        if let Some(n) = self.state_dim {
            if n != state_dim {
                return Err(PlannerError::dimension("configured state dimension", state_dim, n));
            }
        }
        if let Some(m) = self.control_dim {
            if m != control_dim {
                return Err(PlannerError::dimension("configured control dimension", control_dim, m));
            }
        }
        self.sample_bounds.validate(state_dim)?;

        self.validate_weights(state_dim, control_dim)?;

        positive("goal_tolerance", self.goal_tolerance)?;
        positive("dt", self.dt)?;
        positive("steer_tolerance", self.steer_tolerance)?;
        positive("lqr_tolerance", self.lqr_tolerance)?;
        positive("lqr_divergence_bound", self.lqr_divergence_bound)?;
        positive("fallback_gain", self.fallback_gain)?;
        if self.max_steps == 0 {
            return Err(invalid("max_steps must be at least 1"));
        }
        if self.lqr_max_iterations == 0 {
            return Err(invalid("lqr_max_iterations must be at least 1"));
        }

        if let Some(dims) = &self.goal_dimensions {
            if dims.is_empty() {
                return Err(invalid("goal_dimensions must not be empty"));
            }
            if let Some(&bad) = dims.iter().find(|&&d| d >= state_dim) {
                return Err(invalid(&format!(
                    "goal dimension {} is out of range for a state of dimension {}",
                    bad, state_dim
                )));
            }
        }

        for (name, p) in [("p_goal", self.p_goal), ("p_local", self.p_local)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(invalid(&format!("{} must be in [0, 1], got {}", name, p)));
            }
        }
        if self.p_goal + self.p_local > 1.0 {
            return Err(invalid("p_goal + p_local must not exceed 1"));
        }
        let [r_min, r_max] = self.local_radius;
        if !(r_min.is_finite() && r_max.is_finite()) || r_min < 0.0 || r_min > r_max {
            return Err(invalid(&format!(
                "local_radius must satisfy 0 <= r_min <= r_max, got [{}, {}]",
                r_min, r_max
            )));
        }

        match self.neighborhood {
            Neighborhood::Radius(r) => positive("neighborhood radius", r)?,
            Neighborhood::KNearest(0) => return Err(invalid("neighborhood k must be at least 1")),
            Neighborhood::KNearest(_) => {}
        }

        if self.max_iterations == 0 {
            return Err(invalid("max_iterations must be at least 1"));
        }
        if let Some(secs) = self.max_duration_secs {
            positive("max_duration_secs", secs)?;
        }
        Ok(())
    }

    fn validate_weights(&self, n: usize, m: usize) -> PlannerResult<()> {
        if self.q_full.is_none() && !self.q_diag.is_empty() {
            if self.q_diag.len() != n {
                return Err(PlannerError::dimension("q_diag", n, self.q_diag.len()));
            }
            if self.q_diag.iter().any(|&w| !w.is_finite() || w < 0.0) {
                return Err(invalid("q_diag entries must be finite and non-negative"));
            }
        }
        if self.r_full.is_none() && !self.r_diag.is_empty() {
            if self.r_diag.len() != m {
                return Err(PlannerError::dimension("r_diag", m, self.r_diag.len()));
            }
            if self.r_diag.iter().any(|&w| !w.is_finite() || w <= 0.0) {
                return Err(invalid("r_diag entries must be finite and positive"));
            }
        }

        let q = self.q_matrix(n);
        let r = self.r_matrix(m);
        if q.shape() != (n, n) {
            return Err(PlannerError::dimension("Q rows", n, q.nrows()));
        }
        if r.shape() != (m, m) {
            return Err(PlannerError::dimension("R rows", m, r.nrows()));
        }
        check_symmetric("Q", &q)?;
        check_symmetric("R", &r)?;
        if min_eigenvalue(&q) < -1e-12 {
            return Err(invalid("Q must be positive semi-definite"));
        }
        if min_eigenvalue(&r) <= 0.0 {
            return Err(invalid("R must be positive definite"));
        }
        Ok(())
    }
}

fn weight_matrix(full: Option<&DMatrix<f64>>, diag: &[f64], dim: usize) -> DMatrix<f64> {
    match full {
        Some(m) => m.clone(),
        None if diag.is_empty() => DMatrix::identity(dim, dim),
        None => DMatrix::from_diagonal(&DVector::from_column_slice(diag)),
    }
}

fn check_symmetric(name: &str, m: &DMatrix<f64>) -> PlannerResult<()> {
    if m.iter().any(|v| !v.is_finite()) {
        return Err(invalid(&format!("{} must be finite", name)));
    }
    let scale = m.norm().max(1.0);
    if (m - m.transpose()).norm() > 1e-9 * scale {
        return Err(invalid(&format!("{} must be symmetric", name)));
    }
    Ok(())
}

fn min_eigenvalue(m: &DMatrix<f64>) -> f64 {
    m.clone()
        .symmetric_eigen()
        .eigenvalues
        .iter()
        .cloned()
        .fold(f64::INFINITY, f64::min)
}

fn positive(name: &str, value: f64) -> PlannerResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(&format!("{} must be positive, got {}", name, value)))
    }
}

fn invalid(msg: &str) -> PlannerError {
    PlannerError::InvalidParameter(msg.to_string())
}
