//! Resource arbitration: check, transmute and take

pub mod arbiter;
pub mod events;
pub mod policy;
pub mod request;
pub mod transmute;

pub use arbiter::{ActivityContext, Arbiter};
pub use events::{ArbitrationEvent, ArbitrationObserver, EventLog, ShortfallRoute};
pub use policy::{MissingResourceAction, PartialResourcesAvailableAction};
pub use request::{PoolResolution, ResourceRequest, SuccessfulTransmutation};
