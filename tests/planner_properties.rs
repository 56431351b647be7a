use lqr_rrt_star::common::{SampleBounds, State};
use lqr_rrt_star::dynamics::DoubleIntegrator;
use lqr_rrt_star::path_planning::{LqrRrtStar, Neighborhood, PlannerConfig};

/// Disc obstacle of radius 1.5 centred at (4, 4) in the position plane
fn outside_disc(state: &State) -> bool {
    let dx = state[0] - 4.0;
    let dy = state[1] - 4.0;
    dx * dx + dy * dy > 1.5 * 1.5
}

fn config(seed: u64) -> PlannerConfig {
    let mut config = PlannerConfig::new(SampleBounds::from_pairs(&[
        (-1.0, 9.0),
        (-1.0, 9.0),
        (-2.0, 2.0),
        (-2.0, 2.0),
    ]));
    config.goal_dimensions = Some(vec![0, 1]);
    config.goal_tolerance = 0.5;
    config.local_radius = [0.2, 1.0];
    config.neighborhood = Neighborhood::KNearest(6);
    config.seed = seed;
    config
}

fn planner(seed: u64) -> LqrRrtStar<DoubleIntegrator, fn(&State) -> bool> {
    LqrRrtStar::new(
        State::zeros(4),
        State::from_vec(vec![8.0, 8.0, 0.0, 0.0]),
        config(seed),
        DoubleIntegrator::new(2),
        outside_disc as fn(&State) -> bool,
    )
    .unwrap()
}

#[test]
fn tree_stays_an_arborescence() {
    let mut planner = planner(21);
    for _ in 0..200 {
        planner.iterate().unwrap();
        planner.tree().check_invariants().unwrap();
    }
    assert_eq!(planner.tree().len(), planner.stats().inserted + 1);
}

#[test]
fn every_node_is_valid() {
    let mut planner = planner(22);
    for _ in 0..200 {
        planner.iterate().unwrap();
    }
    for node in planner.tree().nodes() {
        assert!(outside_disc(&node.state), "invalid node {:?}", node.state);
    }
}

#[test]
fn costs_never_increase() {
    let mut planner = planner(23);
    let mut previous: Vec<f64> = vec![0.0];
    let mut previous_best = f64::INFINITY;

    for _ in 0..200 {
        planner.iterate().unwrap();
        let costs: Vec<f64> = planner.tree().nodes().iter().map(|n| n.cost).collect();
        for (i, (&before, &after)) in previous.iter().zip(&costs).enumerate() {
            assert!(after <= before + 1e-9, "node {} went from {} to {}", i, before, after);
        }
        previous = costs;

        if let Some(best) = planner.best_cost() {
            assert!(best <= previous_best + 1e-9);
            previous_best = best;
        }
    }
}

#[test]
fn best_path_is_consistent_with_the_tree() {
    let mut planner = planner(24);
    for _ in 0..2000 {
        if planner.path_found() {
            break;
        }
        planner.iterate().unwrap();
    }

    let nodes = planner.best_path_nodes().expect("path around the disc");
    let path = planner.compute_path().unwrap();
    assert_eq!(nodes.len(), path.len());
    assert_eq!(nodes[0], 0);
    assert_eq!(path[0].0, *planner.start());

    for pair in nodes.windows(2) {
        assert_eq!(planner.tree().nodes()[pair[1]].parent, Some(pair[0]));
    }
    let last = &path[path.len() - 1].0;
    assert!(planner.within_goal(last));

    let edge_sum: f64 = nodes.iter().map(|&i| planner.tree().nodes()[i].edge_cost).sum();
    let leaf_cost = planner.tree().nodes()[nodes[nodes.len() - 1]].cost;
    assert!((edge_sum - leaf_cost).abs() < 1e-9 * leaf_cost.max(1.0));

    let diff = last - planner.goal();
    let expected = leaf_cost + diff.norm_squared();
    let cost = planner.best_cost().unwrap();
    assert!((cost - expected).abs() < 1e-9 * expected.max(1.0));
}

#[test]
fn same_seed_builds_the_same_tree() {
    let mut a = planner(99);
    let mut b = planner(99);
    for _ in 0..100 {
        assert_eq!(a.iterate().unwrap(), b.iterate().unwrap());
    }

    assert_eq!(a.tree().len(), b.tree().len());
    for (x, y) in a.tree().nodes().iter().zip(b.tree().nodes()) {
        assert_eq!(x.state, y.state);
        assert_eq!(x.parent, y.parent);
        assert_eq!(x.cost, y.cost);
    }
    assert_eq!(a.stats(), b.stats());
}

#[test]
fn sample_mix_follows_the_probabilities() {
    let mut config = config(5);
    config.p_goal = 0.3;
    config.p_local = 0.0;
    config.attempt_direct_connection = false;
    config.max_iterations = 400;
    let mut planner = LqrRrtStar::new(
        State::zeros(4),
        State::from_vec(vec![8.0, 8.0, 0.0, 0.0]),
        config,
        DoubleIntegrator::new(2),
        outside_disc as fn(&State) -> bool,
    )
    .unwrap();
    planner.plan().unwrap();

    let stats = planner.stats();
    assert_eq!(stats.local_samples, 0);
    let fraction = stats.goal_samples as f64 / stats.iterations as f64;
    assert!((fraction - 0.3).abs() < 0.08, "goal fraction {}", fraction);
}

#[test]
fn no_node_repeats_its_parent() {
    let mut config = config(8);
    config.p_goal = 0.5;
    let mut planner = LqrRrtStar::new(
        State::zeros(4),
        State::from_vec(vec![8.0, 8.0, 0.0, 0.0]),
        config,
        DoubleIntegrator::new(2),
        (|_: &State| true) as fn(&State) -> bool,
    )
    .unwrap();
    for _ in 0..300 {
        planner.iterate().unwrap();
    }
    assert!(planner.path_found());
    assert!(planner.stats().goal_samples > 1);

    let nodes = planner.tree().nodes();
    for (i, node) in nodes.iter().enumerate().skip(1) {
        let parent = &nodes[node.parent.unwrap()];
        assert!(
            node.state != parent.state || node.edge_cost > 0.0,
            "node {} duplicates its parent {:?}",
            i,
            node.parent
        );
    }
    assert_eq!(
        planner.stats().inserted + planner.stats().trapped + planner.stats().no_progress,
        300
    );
}
