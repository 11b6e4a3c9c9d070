//! Failure policies threaded through arbitration

use serde::{Deserialize, Serialize};

/// What to do when a request names a pool the model does not hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MissingResourceAction {
    #[default]
    Ignore,
    ReportWarning,
    ReportErrorAndStop,
}

/// What an activity does when only part of its requests can be met
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PartialResourcesAvailableAction {
    #[default]
    ReportErrorAndStop,
    SkipActivity,
    UseResourcesAvailable,
}

impl PartialResourcesAvailableAction {
    pub fn allows_partial(&self) -> bool {
        matches!(self, PartialResourcesAvailableAction::UseResourcesAvailable)
    }
}
