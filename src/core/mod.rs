pub mod calendar;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod types;

pub use calendar::{Calendar, SimDate};
pub use config::EngineConfig;
pub use diagnostics::Diagnostics;
pub use error::{FarmError, Result};
