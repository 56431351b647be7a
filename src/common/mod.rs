//! Common types, traits, and error definitions for lqr_rrt_star
//!
//! This module provides the foundational building blocks shared by the
//! dynamics providers, the LQR machinery and the planner.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
