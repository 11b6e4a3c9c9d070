use serde::{Deserialize, Serialize};

/// Outcome of an activity's resourcing pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActivityStatus {
    #[default]
    Success,
    Partial,
    Ignored,
    Critical,
    Timer,
    Calculation,
    NotNeeded,
    Warning,
    NoTask,
}

/// Whether a node takes part in the per-step broadcast or only runs when asked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResourceAllocationStyle {
    #[default]
    Automatic,
    Manual,
}
