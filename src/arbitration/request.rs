//! Resource request - the unit of negotiation between an activity and a pool

use serde::Serialize;

use crate::core::types::BatchId;
use crate::resources::labour::LabourCriteria;
use crate::resources::name::ResourceKind;
use crate::resources::registry::{PoolRef, PoolScope};

/// Outcome of locating the pool a request refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolResolution {
    #[default]
    Unresolved,
    Found(PoolRef),
    /// The model does not hold this resource; the request is unconstrained
    Absent,
}

/// Transmutation chosen for a request by the query pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuccessfulTransmutation {
    /// Shortfall pool the transmutation is attached to
    pub pool: PoolRef,
    /// Index into the pool's transmutations
    pub index: usize,
    pub packets: f64,
    /// Amount of the shortfall resource the packets produce
    pub produced: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceRequest {
    pub resource_kind: ResourceKind,
    /// `"Group.Type"` or `"Type"`; empty for labour
    pub resource_type_name: String,
    pub requested: f64,
    pub available: f64,
    pub provided: f64,
    /// Value of the resource provided (labour days x pay rate)
    pub value: f64,
    #[serde(skip)]
    pub resolution: PoolResolution,
    #[serde(skip)]
    pub scope: PoolScope,
    pub allow_transmutation: bool,
    #[serde(skip)]
    pub labour: Option<LabourCriteria>,
    #[serde(skip)]
    pub batch: Option<BatchId>,
    pub category: String,
    pub relates_to: String,
    #[serde(skip)]
    pub successful_transmutation: Option<SuccessfulTransmutation>,
    /// Labour allocation stopped at a member's minimum days
    pub limited_by_labour_minimum: bool,
}

impl ResourceRequest {
    pub fn new(resource_kind: ResourceKind, resource_type_name: impl Into<String>, requested: f64) -> Self {
        Self {
            resource_kind,
            resource_type_name: resource_type_name.into(),
            requested: requested.max(0.0),
            available: 0.0,
            provided: 0.0,
            value: 0.0,
            resolution: PoolResolution::Unresolved,
            scope: PoolScope::Local,
            allow_transmutation: false,
            labour: None,
            batch: None,
            category: String::new(),
            relates_to: String::new(),
            successful_transmutation: None,
            limited_by_labour_minimum: false,
        }
    }

    /// Labour request drawn with the given criteria
    pub fn labour(requested: f64, criteria: LabourCriteria) -> Self {
        let mut request = Self::new(ResourceKind::Labour, "", requested);
        request.labour = Some(criteria);
        request.allow_transmutation = true;
        request
    }

    pub fn transmutable(mut self) -> Self {
        self.allow_transmutation = true;
        self
    }

    pub fn in_market(mut self) -> Self {
        self.scope = PoolScope::Market;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn relating_to(mut self, relates_to: impl Into<String>) -> Self {
        self.relates_to = relates_to.into();
        self
    }

    pub fn pool(&self) -> Option<PoolRef> {
        match self.resolution {
            PoolResolution::Found(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn shortfall(&self) -> f64 {
        (self.requested - self.available).max(0.0)
    }

    pub fn is_short(&self, epsilon: f64) -> bool {
        self.requested - self.available > epsilon
    }

    /// Display name used in reports and error messages
    pub fn display_name(&self) -> String {
        if self.resource_type_name.is_empty() {
            self.resource_kind.name().to_string()
        } else {
            self.resource_type_name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortfall() {
        let mut request = ResourceRequest::new(ResourceKind::AnimalFoodStore, "Hay", 80.0);
        request.available = 50.0;
        assert!((request.shortfall() - 30.0).abs() < 1e-9);
        assert!(request.is_short(1e-6));

        request.available = 80.0 - 1e-9;
        assert!(!request.is_short(1e-6));
    }

    #[test]
    fn test_negative_request_clamped() {
        let request = ResourceRequest::new(ResourceKind::Finance, "Bank", -5.0);
        assert_eq!(request.requested, 0.0);
    }

    #[test]
    fn test_labour_request_allows_transmutation() {
        let request = ResourceRequest::labour(10.0, LabourCriteria::unrestricted(100.0));
        assert!(request.allow_transmutation);
        assert_eq!(request.display_name(), "Labour");
    }
}
