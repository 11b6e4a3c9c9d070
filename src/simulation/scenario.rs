//! TOML scenarios
//!
//! A scenario declares the farm's resources, labour, prices, an optional
//! market and a tree of fixed-demand activities. It stands in for the domain
//! models that would normally decide how much each activity asks for.

use ahash::{AHashMap, AHashSet};
use serde::Deserialize;
use std::path::Path;

use crate::activity::node::{Activity, ActivityNode, LabourDays, StepContext};
use crate::activity::status::ResourceAllocationStyle;
use crate::activity::timer::{IntervalTimer, MonthRangeTimer};
use crate::arbitration::policy::{MissingResourceAction, PartialResourcesAvailableAction};
use crate::arbitration::request::ResourceRequest;
use crate::core::calendar::SimDate;
use crate::core::config::EngineConfig;
use crate::core::error::{FarmError, Result};
use crate::core::types::ActivityId;
use crate::resources::labour::{LabourFilterGroup, LabourMember, LabourPool, LabourRequirement};
use crate::resources::name::ResourceKind;
use crate::resources::pricing::{PurchaseOrSale, ResourcePricing};
use crate::resources::registry::{ResourceGroup, ResourceHolder};
use crate::resources::store::ResourceStore;
use crate::resources::transmutation::Transmutation;
use crate::simulation::farm::Farm;

fn default_labour_name() -> String {
    "Labour".into()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub farm: FarmSpec,
    #[serde(default)]
    pub config: EngineConfig,
    #[serde(default)]
    pub resources: Vec<GroupSpec>,
    #[serde(default)]
    pub labour: Option<LabourSpec>,
    #[serde(default)]
    pub prices: Vec<PriceSpec>,
    #[serde(default)]
    pub market: Option<MarketSpec>,
    #[serde(default)]
    pub activities: Vec<ActivitySpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FarmSpec {
    pub name: String,
    pub start_year: i32,
    #[serde(default = "january")]
    pub start_month: u32,
}

fn january() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupSpec {
    pub kind: ResourceKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub types: Vec<ResourceStore>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabourSpec {
    #[serde(default = "default_labour_name")]
    pub name: String,
    #[serde(default)]
    pub members: Vec<LabourMember>,
    #[serde(default)]
    pub transmutations: Vec<Transmutation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceSpec {
    /// Full `"Group.Type"` name
    pub resource: String,
    #[serde(default = "purchase")]
    pub style: PurchaseOrSale,
    #[serde(flatten)]
    pub pricing: ResourcePricing,
}

fn purchase() -> PurchaseOrSale {
    PurchaseOrSale::Purchase
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketSpec {
    #[serde(default)]
    pub resources: Vec<GroupSpec>,
    #[serde(default)]
    pub labour: Option<LabourSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntervalSpec {
    pub start_year: i32,
    pub start_month: u32,
    pub every_months: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivitySpec {
    pub id: u32,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub allocation_style: ResourceAllocationStyle,
    #[serde(default)]
    pub partial_action: PartialResourcesAvailableAction,
    #[serde(default)]
    pub missing_action: Option<MissingResourceAction>,
    #[serde(default)]
    pub month_range: Option<MonthRangeTimer>,
    #[serde(default)]
    pub interval: Option<IntervalSpec>,
    #[serde(default)]
    pub requests: Vec<RequestSpec>,
    #[serde(default)]
    pub labour: Vec<LabourDemandSpec>,
    #[serde(default)]
    pub children: Vec<ActivitySpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestSpec {
    pub kind: ResourceKind,
    /// `"Group.Type"` or `"Type"`
    pub resource: String,
    pub amount: f64,
    #[serde(default)]
    pub transmute: bool,
    #[serde(default)]
    pub market: bool,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabourDemandSpec {
    pub name: String,
    pub days: f64,
    #[serde(default)]
    pub min_per_person: f64,
    pub max_per_person: f64,
    #[serde(default)]
    pub apply_to_all: bool,
    #[serde(default)]
    pub shortfall_affects_activity: bool,
    #[serde(default)]
    pub filter_groups: Vec<LabourFilterGroup>,
    #[serde(default)]
    pub category: String,
}

/// Activity asking for the same amounts every step it runs
#[derive(Debug, Clone, Default)]
pub struct FixedDemandActivity {
    pub requests: Vec<RequestSpec>,
    pub labour_days: AHashMap<String, LabourDays>,
}

impl Activity for FixedDemandActivity {
    fn requests_for_step(&mut self, _step: &StepContext) -> Vec<ResourceRequest> {
        self.requests
            .iter()
            .map(|spec| {
                let mut request = ResourceRequest::new(spec.kind, spec.resource.clone(), spec.amount)
                    .with_category(spec.category.clone());
                if spec.transmute {
                    request = request.transmutable();
                }
                if spec.market {
                    request = request.in_market();
                }
                request
            })
            .collect()
    }

    fn labour_days_required(&self, requirement: &LabourRequirement, _step: &StepContext) -> LabourDays {
        self.labour_days
            .get(&requirement.name)
            .cloned()
            .unwrap_or_default()
    }
}

impl Scenario {
    pub fn parse_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load_from_toml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Build a ready-to-initialise farm
    pub fn build(&self) -> Result<Farm> {
        let start = SimDate::new(self.farm.start_year, self.farm.start_month);
        let mut farm = Farm::new(self.farm.name.clone(), start, self.config.clone());

        farm.resources = build_holder(&self.resources, self.labour.as_ref())?;
        if let Some(market) = &self.market {
            farm.resources
                .set_market(build_holder(&market.resources, market.labour.as_ref())?);
        }
        for price in &self.prices {
            farm.prices.set(price.resource.clone(), price.style, price.pricing);
        }

        let mut seen = AHashSet::new();
        for spec in &self.activities {
            farm.activities.add(build_node(spec, &mut seen)?);
        }
        tracing::info!(
            farm = %farm.name,
            groups = farm.resources.groups().len(),
            activities = seen.len(),
            "scenario loaded"
        );
        Ok(farm)
    }
}

fn build_holder(groups: &[GroupSpec], labour: Option<&LabourSpec>) -> Result<ResourceHolder> {
    let mut holder = ResourceHolder::new();
    for spec in groups {
        let mut group = ResourceGroup::new(spec.kind);
        if let Some(name) = &spec.name {
            group = group.named(name.clone());
        }
        group.stores = spec.types.clone();
        holder.add_group(group)?;
    }
    if let Some(spec) = labour {
        let mut pool = LabourPool::new(spec.name.clone());
        for member in &spec.members {
            pool.add_member(member.clone());
        }
        pool.transmutations = spec.transmutations.clone();
        holder.set_labour(pool)?;
    }
    Ok(holder)
}

fn build_node(spec: &ActivitySpec, seen: &mut AHashSet<u32>) -> Result<ActivityNode> {
    if !seen.insert(spec.id) {
        return Err(FarmError::InvalidConfiguration(format!(
            "Duplicate activity id {} for [a={}]",
            spec.id, spec.name
        )));
    }

    let mut behaviour = FixedDemandActivity {
        requests: spec.requests.clone(),
        labour_days: AHashMap::new(),
    };
    let mut requirements = Vec::with_capacity(spec.labour.len());
    for labour in &spec.labour {
        if labour.max_per_person < labour.min_per_person {
            return Err(FarmError::InvalidConfiguration(format!(
                "Labour requirement [{}] of [a={}] has a maximum below its minimum",
                labour.name, spec.name
            )));
        }
        let mut requirement = LabourRequirement::new(labour.name.clone(), labour.min_per_person, labour.max_per_person);
        requirement.apply_to_all = labour.apply_to_all;
        requirement.shortfall_affects_activity = labour.shortfall_affects_activity;
        requirement.filter_groups = labour.filter_groups.clone();
        behaviour.labour_days.insert(
            labour.name.clone(),
            LabourDays::new(labour.days).with_category(labour.category.clone()),
        );
        requirements.push(requirement);
    }

    let mut node = ActivityNode::new(ActivityId(spec.id), spec.name.clone(), behaviour)
        .with_partial_action(spec.partial_action);
    node.allocation_style = spec.allocation_style;
    node.missing_action = spec.missing_action;
    node.labour_requirements = requirements;
    if let Some(range) = spec.month_range {
        node = node.with_timer(MonthRangeTimer::new(range.start_month, range.end_month));
    }
    if let Some(interval) = &spec.interval {
        node = node.with_timer(IntervalTimer::new(
            SimDate::new(interval.start_year, interval.start_month),
            interval.every_months,
        ));
    }
    for child in &spec.children {
        node = node.with_child(build_node(child, seen)?);
    }
    if !spec.enabled {
        node.set_enabled(false);
    }
    Ok(node)
}
