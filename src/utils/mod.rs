//! Utility modules for lqr_rrt_star

pub mod grid_map;
pub mod visualization;

pub use grid_map::*;
pub use visualization::{colors, PathStyle, Visualizer};
