//! Kinodynamic path planning
//!
//! LQR-RRT* and its building blocks: configuration, sampler, LQR steering
//! and the arena tree.

pub mod config;
pub mod lqr_rrt_star;
pub mod sampler;
pub mod steering;
pub mod tree;

pub use config::{Neighborhood, PlannerConfig};
pub use lqr_rrt_star::{IterationOutcome, LqrRrtStar, PlanSummary, PlannerStats};
pub use sampler::{SampleKind, Sampler};
pub use steering::{LocalController, QuadraticMetric, SteerOutcome, SteerResult, Steering};
pub use tree::{Tree, TreeNode};
