//! Simulation driver and scenario loading

pub mod farm;
pub mod scenario;

pub use farm::Farm;
pub use scenario::{FixedDemandActivity, Scenario};
