//! lqr_rrt_star - kinodynamic LQR-RRT* planning in Rust
//!
//! This crate plans dynamically feasible trajectories for spacecraft and
//! planar arms. Steering and the nearest-neighbour metric both come from a
//! local LQR solve around the node being extended.

// Core modules
pub mod common;
pub mod utils;

// Algorithm modules
pub mod arm_navigation;
pub mod control;
pub mod dynamics;
pub mod path_planning;

// Re-export common types for convenience
pub use common::{Control, State, Trajectory};
pub use common::{Dynamics, ValidityChecker};
pub use common::{PlannerError, PlannerResult};
pub use path_planning::{LqrRrtStar, PlannerConfig};
