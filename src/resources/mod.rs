//! Resource pools: scalar stores, the labour pool, transmutations and pricing

pub mod labour;
pub mod name;
pub mod pricing;
pub mod registry;
pub mod store;
pub mod transmutation;

pub use labour::{
    LabourCriteria, LabourFilter, LabourFilterGroup, LabourMember, LabourPool, LabourRequirement,
};
pub use name::{ResourceKind, ResourceName};
pub use pricing::{PriceList, PriceLookup, PurchaseOrSale, ResourcePricing};
pub use registry::{PoolRef, PoolScope, ResourceGroup, ResourceHolder};
pub use store::ResourceStore;
pub use transmutation::{Transmutation, Transmute, TransmuteStyle};
