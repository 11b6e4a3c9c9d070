//! Core type definitions used throughout the codebase

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a node in the activity tree
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[display(fmt = "activity#{}", _0)]
pub struct ActivityId(pub u32);

/// Correlation id shared by every request gathered in one resourcing pass
///
/// Labour members remember the last batch they worked for, so a fresh id per
/// pass resets their per-activity allowance.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[display(fmt = "{}", _0)]
pub struct BatchId(pub Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulation step counter (one step is one month)
pub type Step = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_ids_are_unique() {
        let a = BatchId::new();
        let b = BatchId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_activity_id_display() {
        assert_eq!(ActivityId(7).to_string(), "activity#7");
    }
}
