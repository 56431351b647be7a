//! Dynamics providers
//!
//! Concrete implementations of [`crate::common::Dynamics`]. The planner only
//! sees the trait; these models are what the demos and tests plug in.

pub mod central_body;
pub mod clohessy_wiltshire;
pub mod cr3bp;
pub mod double_integrator;
pub mod orbital_elements;

pub use central_body::{CentralBody, RadiusLimits, EARTH_RADIUS, MU_EARTH};
pub use clohessy_wiltshire::ClohessyWiltshire;
pub use cr3bp::Cr3bp;
pub use double_integrator::DoubleIntegrator;
pub use orbital_elements::{circular_orbit, OrbitRegion, OrbitalElements};
