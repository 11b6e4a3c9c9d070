//! Farmstead - resource arbitration and transmutation for farm simulations

pub mod activity;
pub mod arbitration;
pub mod core;
pub mod resources;
pub mod simulation;
