//! Activity tree: nodes, timers and the resourcing walk

pub mod node;
pub mod status;
pub mod timer;
pub mod tree;

pub use node::{Activity, ActivityFolder, ActivityNode, LabourDays, StepContext};
pub use status::{ActivityStatus, ResourceAllocationStyle};
pub use timer::{ActivityTimer, IntervalTimer, MonthRangeTimer, TimerGroup};
pub use tree::{ActivityTree, TriggerSource};
