use std::f64::consts::PI;

use lqr_rrt_star::common::{quadratic_form, Dynamics, SampleBounds, State, ValidityChecker};
use lqr_rrt_star::dynamics::{circular_orbit, CentralBody, RadiusLimits, EARTH_RADIUS, MU_EARTH};
use lqr_rrt_star::path_planning::{LqrRrtStar, Neighborhood, PlannerConfig, Steering};

fn orbits() -> (State, State) {
    let radius = EARTH_RADIUS + 400.0;
    let inclination = 51.6 * PI / 180.0;
    let start = circular_orbit(MU_EARTH, radius, inclination, 0.0, 0.0).unwrap();
    let goal = circular_orbit(MU_EARTH, radius, inclination, 2.0 * PI / 180.0, 0.0).unwrap();
    (start, goal)
}

fn config(start: &State, goal: &State) -> PlannerConfig {
    let pairs: Vec<(f64, f64)> = (0..6)
        .map(|i| {
            let margin = if i < 3 { 150.0 } else { 0.3 };
            (start[i].min(goal[i]) - margin, start[i].max(goal[i]) + margin)
        })
        .collect();
    let mut config = PlannerConfig::new(SampleBounds::from_pairs(&pairs));
    config.state_dim = Some(6);
    config.control_dim = Some(3);
    config.goal_dimensions = Some(vec![0, 1, 2]);
    config.goal_tolerance = 30.0;
    config.local_radius = [5.0, 50.0];
    config.max_steps = 200;
    config.neighborhood = Neighborhood::KNearest(4);
    config.max_iterations = 40;
    config.seed = 7;
    config
}

fn planner() -> LqrRrtStar<CentralBody, RadiusLimits> {
    let (start, goal) = orbits();
    let config = config(&start, &goal);
    LqrRrtStar::new(
        start,
        goal,
        config,
        CentralBody::earth(),
        RadiusLimits::earth_altitude(100.0, 2000.0),
    )
    .unwrap()
}

#[test]
fn plane_change_finds_a_path() {
    let mut planner = planner();
    let summary = planner.plan().unwrap();
    assert!(summary.path_found);
    assert_eq!(planner.stats().first_path_iteration, Some(1));
    planner.tree().check_invariants().unwrap();

    let limits = RadiusLimits::earth_altitude(100.0, 2000.0);
    let path = planner.compute_path().unwrap();
    for (state, _) in &path {
        assert!(limits.is_valid(state));
    }
}

#[test]
fn goal_test_only_looks_at_position() {
    let mut planner = planner();
    planner.plan().unwrap();
    assert!(!planner.goal_nodes().is_empty());

    for &i in planner.goal_nodes() {
        let state = &planner.tree().nodes()[i].state;
        let position_error = (0..3)
            .map(|k| (state[k] - planner.goal()[k]).powi(2))
            .sum::<f64>()
            .sqrt();
        assert!(position_error <= 30.0);
        assert!(planner.within_goal(state));
    }
}

#[test]
fn best_cost_is_no_worse_than_the_direct_steer() {
    let (start, goal) = orbits();
    let config = config(&start, &goal);
    let dynamics = CentralBody::earth();
    let q = config.q_matrix(6);
    let steering = Steering::from_config(&config, q.clone(), config.r_matrix(3));
    let direct = steering
        .steer(
            &dynamics,
            &RadiusLimits::earth_altitude(100.0, 2000.0),
            &start,
            &dynamics.zero_control(),
            &goal,
        )
        .unwrap();
    let direct_cost = direct.edge_cost + quadratic_form(&(&direct.state - &goal), &q);

    let mut planner = planner();
    planner.plan().unwrap();
    let best = planner.best_cost().unwrap();
    assert!(best <= direct_cost * (1.0 + 1e-9), "best {} direct {}", best, direct_cost);
}

#[test]
fn sampled_search_finds_the_plane_change() {
    let (start, goal) = orbits();
    let mut config = config(&start, &goal);
    config.attempt_direct_connection = false;
    config.p_goal = 0.3;
    config.max_iterations = 80;
    let limits = RadiusLimits::earth_altitude(100.0, 2000.0);
    let mut planner = LqrRrtStar::new(start, goal, config, CentralBody::earth(), limits).unwrap();

    let summary = planner.plan().unwrap();
    assert!(summary.path_found);
    assert!(planner.stats().goal_samples >= 1);
    assert!(planner.stats().local_samples + planner.stats().uniform_samples >= 1);
    planner.tree().check_invariants().unwrap();

    let nodes = planner.best_path_nodes().unwrap();
    let leaf = nodes[nodes.len() - 1];
    assert_eq!(planner.tree().depth(leaf), nodes.len() - 1);
    assert!(planner.within_goal(&planner.tree().nodes()[leaf].state));
    for &i in &nodes {
        assert!(limits.is_valid(&planner.tree().nodes()[i].state));
    }
}
