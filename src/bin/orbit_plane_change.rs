//
// Orbit plane change with LQR-RRT*
//
// Plans a low-thrust transfer between two circular LEO orbits that differ
// only in right ascension of the ascending node. The tree and the best path
// are projected on the inertial x-y and x-z planes and saved as SVGs.
//
// usage: orbit_plane_change [config.toml]
//

use std::env;
use std::f64::consts::PI;
use std::process;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lqr_rrt_star::common::{SampleBounds, State};
use lqr_rrt_star::dynamics::{circular_orbit, CentralBody, RadiusLimits, EARTH_RADIUS, MU_EARTH};
use lqr_rrt_star::path_planning::{LqrRrtStar, Neighborhood, PlannerConfig};
use lqr_rrt_star::utils::{colors, PathStyle, Visualizer};
use lqr_rrt_star::PlannerResult;

const ALTITUDE: f64 = 400.0;
const INCLINATION_DEG: f64 = 51.6;
const RAAN_CHANGE_DEG: f64 = 2.0;

/// Box around the start and goal states
fn transfer_bounds(start: &State, goal: &State, position_margin: f64, velocity_margin: f64) -> SampleBounds {
    let pairs: Vec<(f64, f64)> = (0..6)
        .map(|i| {
            let margin = if i < 3 { position_margin } else { velocity_margin };
            (start[i].min(goal[i]) - margin, start[i].max(goal[i]) + margin)
        })
        .collect();
    SampleBounds::from_pairs(&pairs)
}

fn default_config(start: &State, goal: &State) -> PlannerConfig {
    let mut config = PlannerConfig::new(transfer_bounds(start, goal, 150.0, 0.3));
    config.state_dim = Some(6);
    config.control_dim = Some(3);
    config.goal_dimensions = Some(vec![0, 1, 2]);
    config.goal_tolerance = 30.0;
    config.local_radius = [5.0, 50.0];
    config.dt = 0.1;
    config.max_steps = 200;
    config.neighborhood = Neighborhood::KNearest(5);
    config.max_iterations = 2000;
    config.max_duration_secs = Some(60.0);
    config.seed = 7;
    config
}

fn run() -> PlannerResult<()> {
    let radius = EARTH_RADIUS + ALTITUDE;
    let inclination = INCLINATION_DEG * PI / 180.0;
    let start = circular_orbit(MU_EARTH, radius, inclination, 0.0, 0.0)?;
    let goal = circular_orbit(MU_EARTH, radius, inclination, RAAN_CHANGE_DEG * PI / 180.0, 0.0)?;

    let config = match env::args().nth(1) {
        Some(path) => {
            info!(path = %path, "loading planner configuration");
            PlannerConfig::from_toml_file(&path)?
        }
        None => default_config(&start, &goal),
    };

    let mut planner = LqrRrtStar::new(
        start.clone(),
        goal.clone(),
        config,
        CentralBody::earth(),
        RadiusLimits::earth_altitude(100.0, 2000.0),
    )?;
    let summary = planner.plan()?;

    let path = planner.compute_path();
    match &path {
        Some(path) => info!(
            waypoints = path.len(),
            cost = ?summary.best_cost,
            iterations = summary.iterations,
            "path found"
        ),
        None => warn!(nodes = summary.nodes, "no path within the budget"),
    }

    // x-y shows the along-track motion, x-z the tilt of the orbit plane
    for (file, y_dim, label) in [("orbit_plane_change.svg", 1, "y [km]"), ("orbit_plane_change_xz.svg", 2, "z [km]")] {
        let mut vis = Visualizer::new();
        vis.set_title("LQR-RRT* orbit plane change")
            .set_labels("x [km]", label)
            .set_projection(0, y_dim)
            .set_aspect_ratio(None)
            .plot_tree(planner.tree())
            .plot_start(&start)
            .plot_goal(&goal);
        if let Some(path) = &path {
            vis.plot_trajectory(path, &PathStyle::new(colors::PATH, "LQR-RRT*"));
        }
        if let Err(e) = vis.save_svg(file) {
            warn!(file, error = %e, "could not save plot");
        }
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
