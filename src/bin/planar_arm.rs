//
// Planar arm planning with LQR-RRT*
//
// A two-link arm based in the middle of the bottom row swings from the
// right side to the left side of a 40 x 30 cell workspace. A block above the
// base rules out the straight-up pose, so the arm has to bend around it.
//
// usage: planar_arm [config.toml]
//

use std::env;
use std::f64::consts::PI;
use std::process;

use nalgebra::DMatrix;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lqr_rrt_star::arm_navigation::{ArmValidityChecker, PlanarArm};
use lqr_rrt_star::common::State;
use lqr_rrt_star::path_planning::{LqrRrtStar, Neighborhood, PlannerConfig};
use lqr_rrt_star::utils::{colors, OccupancyGrid, PathStyle, Visualizer};
use lqr_rrt_star::PlannerResult;

const LINKS: usize = 2;
const GRID_SCALE: usize = 5;

/// 8 x 6 coarse cells, scaled to 40 x 30
fn workspace() -> PlannerResult<OccupancyGrid> {
    let mut coarse = DMatrix::<i32>::zeros(6, 8);
    coarse[(3, 4)] = 1;
    coarse[(5, 0)] = 1;
    OccupancyGrid::new(coarse, GRID_SCALE)
}

fn default_config(arm: &PlanarArm) -> PlannerConfig {
    let mut config = PlannerConfig::new(arm.sample_bounds());
    config.goal_tolerance = 0.1;
    config.local_radius = [0.1, 0.6];
    config.neighborhood = Neighborhood::KNearest(8);
    config.max_iterations = 3000;
    config.max_duration_secs = Some(30.0);
    config.seed = 11;
    config
}

fn run() -> PlannerResult<()> {
    let arm = PlanarArm::new(LINKS);
    let checker = ArmValidityChecker::new(workspace()?);

    let start = State::from_vec(vec![PI / 3.0, PI / 3.0]);
    let goal = State::from_vec(vec![2.0 * PI / 3.0, 2.0 * PI / 3.0]);

    let config = match env::args().nth(1) {
        Some(path) => {
            info!(path = %path, "loading planner configuration");
            PlannerConfig::from_toml_file(&path)?
        }
        None => default_config(&arm),
    };

    let mut planner = LqrRrtStar::new(start.clone(), goal.clone(), config, arm, checker.clone())?;
    let summary = planner.plan()?;

    let mut vis = Visualizer::new();
    vis.set_title("LQR-RRT* planar arm")
        .set_x_range(0.0, checker.grid().x_size() as f64)
        .set_y_range(0.0, checker.grid().y_size() as f64)
        .plot_grid(checker.grid())
        .plot_arm(&checker, &start, &PathStyle::new(colors::START, "Start"))
        .plot_arm(&checker, &goal, &PathStyle::new(colors::GOAL, "Goal"));

    match planner.compute_path() {
        Some(path) => {
            info!(
                waypoints = path.len(),
                cost = ?summary.best_cost,
                iterations = summary.iterations,
                "path found"
            );
            for (state, _) in &path {
                vis.plot_arm(&checker, state, &PathStyle::new(colors::ARM, "").with_line_width(1.0));
            }
        }
        None => warn!(nodes = summary.nodes, "no path within the budget"),
    }

    if let Err(e) = vis.save_svg("planar_arm.svg") {
        warn!(error = %e, "could not save plot");
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run() {
        error!(error = %e, "planning failed");
        process::exit(1);
    }
}
