//! LQR-RRT* planner
//!
//! RRT* where both the steering function and the distance metric come from
//! a local LQR solve. Each iteration samples a target, steers from the
//! nearest node, chooses the cheapest parent in the near set, inserts the
//! new node and rewires its neighbours through it.
//!
//! The planner is generic over the dynamics and the validity checker, so
//! the orbital and the planar-arm problems share this code.

use std::iter;
use std::time::{Duration, Instant};

use itertools::Itertools;
use nalgebra::DMatrix;
use tracing::{debug, info, trace};

use crate::common::{
    is_finite, quadratic_form, Dynamics, PlannerError, PlannerResult, State, Trajectory,
    ValidityChecker,
};
use crate::path_planning::config::PlannerConfig;
use crate::path_planning::sampler::{SampleKind, Sampler};
use crate::path_planning::steering::{QuadraticMetric, SteerResult, Steering};
use crate::path_planning::tree::Tree;

/// What a single `iterate()` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// Steering from the nearest node failed on its first step
    Trapped,
    /// The nearest node already sits on the target, nothing to insert
    NoProgress,
    Inserted {
        node: usize,
        rewired: usize,
        reached_goal: bool,
    },
}

/// Counters collected while planning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlannerStats {
    pub iterations: usize,
    pub goal_samples: usize,
    pub local_samples: usize,
    pub uniform_samples: usize,
    pub trapped: usize,
    pub no_progress: usize,
    pub inserted: usize,
    pub rewires: usize,
    pub lqr_fallbacks: usize,
    pub first_path_iteration: Option<usize>,
}

impl PlannerStats {
    fn record_sample(&mut self, kind: SampleKind) {
        match kind {
            SampleKind::Goal => self.goal_samples += 1,
            SampleKind::Local => self.local_samples += 1,
            SampleKind::Uniform => self.uniform_samples += 1,
        }
    }
}

/// Result of a budgeted `plan()` run
#[derive(Debug, Clone)]
pub struct PlanSummary {
    /// Iterations performed by this call
    pub iterations: usize,
    pub nodes: usize,
    pub path_found: bool,
    /// Quadratic cost of the best path, if any
    pub best_cost: Option<f64>,
    pub elapsed: Duration,
}

pub struct LqrRrtStar<D, V>
where
    D: Dynamics,
    V: ValidityChecker,
{
    dynamics: D,
    validity: V,
    config: PlannerConfig,
    start: State,
    goal: State,
    q: DMatrix<f64>,
    goal_indices: Vec<usize>,
    steering: Steering,
    sampler: Sampler,
    tree: Tree,
    goal_nodes: Vec<usize>,
    stats: PlannerStats,
    direct_attempted: bool,
}

impl<D, V> LqrRrtStar<D, V>
where
    D: Dynamics,
    V: ValidityChecker,
{
    /// Build a planner. Every configuration problem is reported here.
    pub fn new(start: State, goal: State, config: PlannerConfig, dynamics: D, validity: V) -> PlannerResult<Self> {
        let n = dynamics.state_dim();
        let m = dynamics.control_dim();
        config.validate(n, m)?;

        if start.len() != n {
            return Err(PlannerError::dimension("start state", n, start.len()));
        }
        if goal.len() != n {
            return Err(PlannerError::dimension("goal state", n, goal.len()));
        }
        if !is_finite(&start) || !is_finite(&goal) {
            return Err(PlannerError::InvalidParameter(
                "start and goal states must be finite".to_string(),
            ));
        }
        if !validity.is_valid(&start) {
            return Err(PlannerError::InvalidParameter(format!(
                "start state {:?} is not valid",
                start.as_slice()
            )));
        }

        let q = config.q_matrix(n);
        let r = config.r_matrix(m);
        let steering = Steering::from_config(&config, q.clone(), r);
        let sampler = Sampler::from_config(&config, goal.clone());
        let tree = Tree::new(start.clone(), dynamics.zero_control());
        let goal_indices = config.goal_indices(n);

        Ok(LqrRrtStar {
            dynamics,
            validity,
            config,
            start,
            goal,
            q,
            goal_indices,
            steering,
            sampler,
            tree,
            goal_nodes: Vec::new(),
            stats: PlannerStats::default(),
            direct_attempted: false,
        })
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn stats(&self) -> &PlannerStats {
        &self.stats
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn dynamics(&self) -> &D {
        &self.dynamics
    }

    pub fn steering(&self) -> &Steering {
        &self.steering
    }

    pub fn start(&self) -> &State {
        &self.start
    }

    pub fn goal(&self) -> &State {
        &self.goal
    }

    /// Nodes within the goal tolerance, in insertion order
    pub fn goal_nodes(&self) -> &[usize] {
        &self.goal_nodes
    }

    pub fn path_found(&self) -> bool {
        !self.goal_nodes.is_empty()
    }

    /// One search step
    pub fn iterate(&mut self) -> PlannerResult<IterationOutcome> {
        self.stats.iterations += 1;
        let iteration = self.stats.iterations;
        if iteration % 100 == 0 {
            debug!(
                iteration,
                nodes = self.tree.len(),
                path_found = self.path_found(),
                "LQR-RRT* progress"
            );
        }

        let (kind, target) = if self.config.attempt_direct_connection && !self.direct_attempted {
            self.direct_attempted = true;
            (SampleKind::Goal, self.goal.clone())
        } else {
            self.sample()
        };
        self.stats.record_sample(kind);

        let outcome = self.extend(&target)?;
        if let IterationOutcome::Inserted { node, reached_goal: true, .. } = outcome {
            if self.stats.first_path_iteration.is_none() {
                self.stats.first_path_iteration = Some(iteration);
                info!(
                    iteration,
                    node,
                    nodes = self.tree.len(),
                    cost = self.tree.nodes()[node].cost,
                    "first path found"
                );
            }
        }
        Ok(outcome)
    }

    /// Iterate until the iteration or time budget is spent, or until the
    /// first path when `stop_at_first_path` is set
    pub fn plan(&mut self) -> PlannerResult<PlanSummary> {
        let started = Instant::now();
        let time_budget = self.config.max_duration_secs.map(Duration::from_secs_f64);
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            if self.config.stop_at_first_path && self.path_found() {
                break;
            }
            if let Some(budget) = time_budget {
                if started.elapsed() >= budget {
                    break;
                }
            }
            self.iterate()?;
            iterations += 1;
        }

        let summary = PlanSummary {
            iterations,
            nodes: self.tree.len(),
            path_found: self.path_found(),
            best_cost: self.best_cost(),
            elapsed: started.elapsed(),
        };
        info!(
            iterations = summary.iterations,
            nodes = summary.nodes,
            path_found = summary.path_found,
            best_cost = ?summary.best_cost,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "planning finished"
        );
        Ok(summary)
    }

    /// Goal node with the lowest cost-to-come plus terminal penalty
    pub fn best_goal_node(&self) -> Option<usize> {
        best_goal_node(&self.tree, &self.goal_nodes, |x| self.terminal_penalty(x, &self.goal))
    }

    /// Node indices of the best path, root first
    pub fn best_path_nodes(&self) -> Option<Vec<usize>> {
        self.best_goal_node().map(|goal| {
            let mut path = self.tree.path_to_root(goal);
            path.reverse();
            path
        })
    }

    /// `(state, incoming control)` pairs from the root to the best goal node
    pub fn compute_path(&self) -> Option<Trajectory> {
        self.best_path_nodes().map(|path| {
            path.iter()
                .map(|&i| {
                    let node = &self.tree.nodes()[i];
                    (node.state.clone(), node.control.clone())
                })
                .collect()
        })
    }

    /// Sum of the edge running costs along `path` plus the terminal penalty
    /// `(x_N − goal)ᵀ Q (x_N − goal)`
    pub fn compute_quadratic_cost(&self, path: &[usize], goal: &State) -> f64 {
        let running: f64 = path
            .iter()
            .filter_map(|&i| self.tree.node(i))
            .map(|node| node.edge_cost)
            .sum();
        let terminal = path
            .last()
            .and_then(|&i| self.tree.node(i))
            .map_or(0.0, |node| self.terminal_penalty(&node.state, goal));
        running + terminal
    }

    /// Quadratic cost of the best path
    pub fn best_cost(&self) -> Option<f64> {
        self.best_path_nodes()
            .map(|path| self.compute_quadratic_cost(&path, &self.goal))
    }

    /// Euclidean distance to the goal over the goal dimensions
    pub fn goal_distance(&self, state: &State) -> f64 {
        goal_distance(&self.dynamics, &self.goal_indices, state, &self.goal)
    }

    pub fn within_goal(&self, state: &State) -> bool {
        self.goal_distance(state) <= self.config.goal_tolerance
    }

    fn terminal_penalty(&self, state: &State, goal: &State) -> f64 {
        quadratic_form(&self.dynamics.difference(state, goal), &self.q)
    }

    /// Local samples perturb a random node of the best path, or the node
    /// closest to the goal while no path exists
    fn sample(&mut self) -> (SampleKind, State) {
        let LqrRrtStar {
            dynamics,
            goal,
            q,
            goal_indices,
            sampler,
            tree,
            goal_nodes,
            ..
        } = self;

        sampler.sample(|sampler| {
            let penalty = |x: &State| quadratic_form(&dynamics.difference(x, goal), q);
            let index = match best_goal_node(tree, goal_nodes, penalty) {
                Some(leaf) => {
                    let path = tree.path_to_root(leaf);
                    path[sampler.index(path.len())]
                }
                None => tree.nearest(|x| goal_distance(&*dynamics, goal_indices, x, goal)),
            };
            tree.nodes()[index].state.clone()
        })
    }

    fn metric(&mut self, query: &State) -> PlannerResult<QuadraticMetric> {
        let metric = self.steering.metric(&self.dynamics, query)?;
        if metric.used_fallback {
            self.stats.lqr_fallbacks += 1;
        }
        Ok(metric)
    }

    fn steer_between(&mut self, from: usize, target: &State) -> PlannerResult<SteerResult> {
        let node = &self.tree.nodes()[from];
        let result = self
            .steering
            .steer(&self.dynamics, &self.validity, &node.state, &node.control, target)?;
        if result.used_fallback {
            self.stats.lqr_fallbacks += 1;
        }
        Ok(result)
    }

    fn extend(&mut self, target: &State) -> PlannerResult<IterationOutcome> {
        let metric = self.metric(target)?;
        let nearest = self
            .tree
            .nearest(|x| metric.distance(&self.dynamics, x, target));

        let first = self.steer_between(nearest, target)?;
        if first.is_trapped() {
            self.stats.trapped += 1;
            return Ok(IterationOutcome::Trapped);
        }
        if first.trajectory.is_empty() {
            self.stats.no_progress += 1;
            return Ok(IterationOutcome::NoProgress);
        }

        let near_metric = self.metric(&first.state)?;
        let near = self.tree.near(
            |x| near_metric.distance(&self.dynamics, x, &first.state),
            self.config.neighborhood,
        );

        let (parent, chosen) = self.choose_parent(nearest, first, &near)?;
        let node = self
            .tree
            .insert(chosen.state, chosen.control, parent, chosen.edge_cost)?;
        self.stats.inserted += 1;

        let rewired = self.rewire(node, parent, &near)?;

        let reached_goal = self.within_goal(&self.tree.nodes()[node].state);
        if reached_goal {
            self.goal_nodes.push(node);
        }
        Ok(IterationOutcome::Inserted {
            node,
            rewired,
            reached_goal,
        })
    }

    /// Cheapest parent among the near set and the nearest node. The nearest
    /// node keeps its first steering result; other candidates must reach
    /// the new state in at least one step. Ties go to the earliest node.
    fn choose_parent(
        &mut self,
        nearest: usize,
        first: SteerResult,
        near: &[usize],
    ) -> PlannerResult<(usize, SteerResult)> {
        let target = first.state.clone();
        let mut first = Some(first);
        let mut best: Option<(usize, f64, SteerResult)> = None;

        for candidate in near.iter().copied().chain(iter::once(nearest)).sorted().dedup() {
            let result = if candidate == nearest {
                match first.take() {
                    Some(result) => result,
                    None => continue,
                }
            } else {
                let result = self.steer_between(candidate, &target)?;
                // a zero-step steer would copy the candidate itself
                if !result.is_reached() || result.trajectory.is_empty() {
                    continue;
                }
                result
            };

            let cost = self.tree.nodes()[candidate].cost + result.edge_cost;
            if best.as_ref().map_or(true, |(_, best_cost, _)| cost < *best_cost) {
                best = Some((candidate, cost, result));
            }
        }

        best.map(|(parent, _, result)| (parent, result))
            .ok_or_else(|| PlannerError::Tree("no parent candidate for the new node".to_string()))
    }

    /// Route near nodes through `new_node` when that is strictly cheaper
    fn rewire(&mut self, new_node: usize, parent: usize, near: &[usize]) -> PlannerResult<usize> {
        let mut rewired = 0;
        for &candidate in near {
            if candidate == parent || candidate == Tree::ROOT || candidate == new_node {
                continue;
            }
            if self.tree.is_ancestor(candidate, new_node) {
                continue;
            }

            let target = self.tree.nodes()[candidate].state.clone();
            let result = self.steer_between(new_node, &target)?;
            if !result.is_reached() {
                continue;
            }

            let old_cost = self.tree.nodes()[candidate].cost;
            let new_cost = self.tree.nodes()[new_node].cost + result.edge_cost;
            if new_cost < old_cost {
                self.tree.reparent(candidate, new_node, result.edge_cost)?;
                self.tree.set_incoming_control(candidate, result.control)?;
                trace!(node = candidate, via = new_node, old_cost, new_cost, "rewired");
                rewired += 1;
            }
        }
        self.stats.rewires += rewired;
        Ok(rewired)
    }
}

fn best_goal_node<F>(tree: &Tree, goal_nodes: &[usize], terminal_penalty: F) -> Option<usize>
where
    F: Fn(&State) -> f64,
{
    let mut best = None;
    let mut best_score = f64::INFINITY;
    for &i in goal_nodes {
        let node = &tree.nodes()[i];
        let score = node.cost + terminal_penalty(&node.state);
        if score < best_score {
            best_score = score;
            best = Some(i);
        }
    }
    best
}

fn goal_distance<D: Dynamics + ?Sized>(dynamics: &D, indices: &[usize], state: &State, goal: &State) -> f64 {
    let diff = dynamics.difference(state, goal);
    indices.iter().map(|&i| diff[i] * diff[i]).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{AlwaysValid, Control, SampleBounds};
    use crate::dynamics::DoubleIntegrator;
    use crate::path_planning::config::Neighborhood;
    use approx::assert_relative_eq;

    /// `ẋ = u` on the real line
    struct SingleIntegrator;

    impl Dynamics for SingleIntegrator {
        fn state_dim(&self) -> usize {
            1
        }

        fn control_dim(&self) -> usize {
            1
        }

        fn derivative(&self, _state: &State, control: &Control) -> State {
            control.clone()
        }
    }

    fn line_planner() -> LqrRrtStar<SingleIntegrator, AlwaysValid> {
        let mut config = PlannerConfig::new(SampleBounds::uniform(1, -20.0, 20.0));
        config.attempt_direct_connection = false;
        config.max_steps = 200;
        config.neighborhood = Neighborhood::KNearest(10);
        config.seed = 1;
        LqrRrtStar::new(
            State::from_vec(vec![0.0]),
            State::from_vec(vec![10.0]),
            config,
            SingleIntegrator,
            AlwaysValid,
        )
        .unwrap()
    }

    fn plane_config() -> PlannerConfig {
        let mut config = PlannerConfig::new(SampleBounds::from_pairs(&[
            (-2.0, 10.0),
            (-2.0, 10.0),
            (-2.0, 2.0),
            (-2.0, 2.0),
        ]));
        config.goal_dimensions = Some(vec![0, 1]);
        config.goal_tolerance = 0.5;
        config.neighborhood = Neighborhood::KNearest(5);
        config.seed = 3;
        config
    }

    fn plane_planner(config: PlannerConfig) -> LqrRrtStar<DoubleIntegrator, AlwaysValid> {
        LqrRrtStar::new(
            State::zeros(4),
            State::from_vec(vec![8.0, 8.0, 0.0, 0.0]),
            config,
            DoubleIntegrator::new(2),
            AlwaysValid,
        )
        .unwrap()
    }

    #[test]
    fn test_construction_rejects_bad_input() {
        let config = plane_config();
        let wrong_goal = LqrRrtStar::new(
            State::zeros(4),
            State::zeros(3),
            config.clone(),
            DoubleIntegrator::new(2),
            AlwaysValid,
        );
        assert!(matches!(wrong_goal, Err(PlannerError::DimensionMismatch { .. })));

        let blocked_start = LqrRrtStar::new(
            State::zeros(4),
            State::from_vec(vec![8.0, 8.0, 0.0, 0.0]),
            config.clone(),
            DoubleIntegrator::new(2),
            |s: &State| s[0] > 1.0,
        );
        assert!(matches!(blocked_start, Err(PlannerError::InvalidParameter(_))));

        let mut bad = config;
        bad.r_diag = vec![1.0, -1.0];
        assert!(LqrRrtStar::new(
            State::zeros(4),
            State::zeros(4),
            bad,
            DoubleIntegrator::new(2),
            AlwaysValid
        )
        .is_err());
    }

    #[test]
    fn test_direct_connection_finds_path_on_first_iteration() {
        let mut planner = plane_planner(plane_config());
        let outcome = planner.iterate().unwrap();
        assert!(matches!(
            outcome,
            IterationOutcome::Inserted { node: 1, reached_goal: true, .. }
        ));
        assert!(planner.path_found());

        let path = planner.compute_path().unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].0, State::zeros(4));
        assert_eq!(path[0].1, Control::zeros(2));
        assert!(planner.within_goal(&path[1].0));
        assert_eq!(planner.stats().first_path_iteration, Some(1));
    }

    #[test]
    fn test_quadratic_cost_is_edge_costs_plus_terminal_penalty() {
        let mut planner = plane_planner(plane_config());
        planner.iterate().unwrap();
        let path = planner.best_path_nodes().unwrap();
        let node = &planner.tree().nodes()[path[1]];
        let diff = &node.state - planner.goal();
        let expected = node.edge_cost + diff.norm_squared();
        assert_relative_eq!(
            planner.compute_quadratic_cost(&path, planner.goal()),
            expected,
            max_relative = 1e-12
        );
        assert_relative_eq!(planner.best_cost().unwrap(), expected, max_relative = 1e-12);
    }

    #[test]
    fn test_new_node_rewires_a_costlier_neighbour() {
        let mut planner = line_planner();

        let first = planner.extend(&State::from_vec(vec![4.0])).unwrap();
        let far = match first {
            IterationOutcome::Inserted { node, .. } => node,
            other => panic!("unexpected outcome {:?}", other),
        };
        let cost_before = planner.tree().nodes()[far].cost;

        let second = planner.extend(&State::from_vec(vec![2.0])).unwrap();
        let middle = match second {
            IterationOutcome::Inserted { node, rewired, .. } => {
                assert_eq!(rewired, 1);
                node
            }
            other => panic!("unexpected outcome {:?}", other),
        };

        // the far node now hangs below the middle one and got cheaper
        assert_eq!(planner.tree().nodes()[middle].parent, Some(Tree::ROOT));
        assert_eq!(planner.tree().nodes()[far].parent, Some(middle));
        assert!(planner.tree().nodes()[far].cost < cost_before);
        assert_eq!(planner.stats().rewires, 1);
        planner.tree().check_invariants().unwrap();
    }

    #[test]
    fn test_trapped_iteration_leaves_tree_untouched() {
        let start = State::zeros(4);
        let only_start = move |s: &State| s.norm() < 1e-12;
        let mut planner = LqrRrtStar::new(
            start,
            State::from_vec(vec![8.0, 8.0, 0.0, 0.0]),
            plane_config(),
            DoubleIntegrator::new(2),
            only_start,
        )
        .unwrap();

        for _ in 0..10 {
            assert_eq!(planner.iterate().unwrap(), IterationOutcome::Trapped);
        }
        assert_eq!(planner.tree().len(), 1);
        assert_eq!(planner.stats().trapped, 10);
        assert!(!planner.path_found());
        assert!(planner.compute_path().is_none());
    }

    #[test]
    fn test_target_on_existing_node_inserts_nothing() {
        let mut planner = line_planner();
        let node = match planner.extend(&State::from_vec(vec![4.0])).unwrap() {
            IterationOutcome::Inserted { node, .. } => node,
            other => panic!("unexpected outcome {:?}", other),
        };
        let existing = planner.tree().nodes()[node].state.clone();

        let outcome = planner.extend(&existing).unwrap();
        assert_eq!(outcome, IterationOutcome::NoProgress);
        assert_eq!(planner.tree().len(), 2);
        assert_eq!(planner.stats().no_progress, 1);
        assert_eq!(planner.stats().inserted, 1);
    }

    #[test]
    fn test_plan_stops_at_first_path() {
        let mut config = plane_config();
        config.stop_at_first_path = true;
        let mut planner = plane_planner(config);
        let summary = planner.plan().unwrap();
        assert_eq!(summary.iterations, 1);
        assert!(summary.path_found);
        assert!(summary.best_cost.is_some());
    }

    #[test]
    fn test_plan_respects_time_budget() {
        let mut config = plane_config();
        config.max_iterations = 1_000_000;
        config.max_duration_secs = Some(0.05);
        let mut planner = plane_planner(config);
        let summary = planner.plan().unwrap();
        assert!(summary.iterations < 1_000_000);
        assert!(summary.elapsed >= Duration::from_millis(50));
        planner.tree().check_invariants().unwrap();
    }

    #[test]
    fn test_plan_counts_samples() {
        let mut config = plane_config();
        config.max_iterations = 60;
        let mut planner = plane_planner(config);
        let summary = planner.plan().unwrap();
        let stats = planner.stats();
        assert_eq!(summary.iterations, 60);
        assert_eq!(stats.iterations, 60);
        assert_eq!(stats.goal_samples + stats.local_samples + stats.uniform_samples, 60);
        assert_eq!(stats.inserted + stats.trapped + stats.no_progress, 60);
        assert_eq!(planner.tree().len(), stats.inserted + 1);
    }

    #[test]
    fn test_non_finite_dynamics_propagates() {
        struct Exploding;
        impl Dynamics for Exploding {
            fn state_dim(&self) -> usize {
                1
            }
            fn control_dim(&self) -> usize {
                1
            }
            fn derivative(&self, _state: &State, _control: &Control) -> State {
                State::from_vec(vec![f64::INFINITY])
            }
        }

        let mut config = PlannerConfig::new(SampleBounds::uniform(1, -1.0, 1.0));
        config.seed = 5;
        let mut planner = LqrRrtStar::new(
            State::from_vec(vec![0.0]),
            State::from_vec(vec![1.0]),
            config,
            Exploding,
            AlwaysValid,
        )
        .unwrap();
        assert!(matches!(planner.iterate(), Err(PlannerError::NonFiniteDynamics(_))));
    }
}
