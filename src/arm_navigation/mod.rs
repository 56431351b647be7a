// Arm navigation module

pub mod planar_arm;

pub use planar_arm::*;
