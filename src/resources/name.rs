//! Resource kinds and resource name parsing
//!
//! A resource type is addressed either as `"Type"` (kind supplies the group)
//! or as `"Group.Type"`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability tag of a resource group
///
/// The registry holds at most one group per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Land,
    Finance,
    AnimalFoodStore,
    HumanFoodStore,
    GrazeFoodStore,
    ProductStore,
    Equipment,
    WaterStore,
    GreenhouseGases,
    OtherAnimals,
    Labour,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 11] = [
        ResourceKind::Land,
        ResourceKind::Finance,
        ResourceKind::AnimalFoodStore,
        ResourceKind::HumanFoodStore,
        ResourceKind::GrazeFoodStore,
        ResourceKind::ProductStore,
        ResourceKind::Equipment,
        ResourceKind::WaterStore,
        ResourceKind::GreenhouseGases,
        ResourceKind::OtherAnimals,
        ResourceKind::Labour,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::Land => "Land",
            ResourceKind::Finance => "Finance",
            ResourceKind::AnimalFoodStore => "AnimalFoodStore",
            ResourceKind::HumanFoodStore => "HumanFoodStore",
            ResourceKind::GrazeFoodStore => "GrazeFoodStore",
            ResourceKind::ProductStore => "ProductStore",
            ResourceKind::Equipment => "Equipment",
            ResourceKind::WaterStore => "WaterStore",
            ResourceKind::GreenhouseGases => "GreenhouseGases",
            ResourceKind::OtherAnimals => "OtherAnimals",
            ResourceKind::Labour => "Labour",
        }
    }

    /// Case-insensitive lookup by kind name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed `"Group.Type"` or `"Type"` identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceName {
    pub group: Option<String>,
    pub item: String,
}

impl ResourceName {
    /// Parse a resource identifier; more than one `.` is invalid
    pub fn parse(name: &str) -> Option<Self> {
        let mut parts = name.split('.');
        let first = parts.next()?.trim();
        match (parts.next(), parts.next()) {
            (None, _) => Some(Self {
                group: None,
                item: first.to_string(),
            }),
            (Some(item), None) => Some(Self {
                group: (!first.is_empty()).then(|| first.to_string()),
                item: item.trim().to_string(),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{}.{}", group, self.item),
            None => f.write_str(&self.item),
        }
    }
}
