//! Error types for lqr_rrt_star

use thiserror::Error;

/// Main error type for the planner
#[derive(Debug, Error)]
pub enum PlannerError {
    /// Invalid parameter or configuration value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// A vector or matrix does not have the expected dimension
    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },
    /// The dynamics provider produced NaN or infinite values
    #[error("Non-finite dynamics: {0}")]
    NonFiniteDynamics(String),
    /// A tree mutation would break the arborescence
    #[error("Tree error: {0}")]
    Tree(String),
    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlannerError {
    pub(crate) fn dimension(what: &str, expected: usize, actual: usize) -> Self {
        PlannerError::DimensionMismatch {
            what: what.to_string(),
            expected,
            actual,
        }
    }
}

/// Result type alias for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
