//! Activity nodes
//!
//! A node owns its children and a boxed `Activity` behaviour that produces
//! resource requests and performs the domain effect. The node keeps its own
//! status and the requests of its last pass.

use std::fmt::Debug;

use crate::activity::status::{ActivityStatus, ResourceAllocationStyle};
use crate::activity::timer::ActivityTimer;
use crate::arbitration::arbiter::ActivityContext;
use crate::arbitration::policy::{MissingResourceAction, PartialResourcesAvailableAction};
use crate::arbitration::request::ResourceRequest;
use crate::core::calendar::SimDate;
use crate::core::types::{ActivityId, Step};
use crate::resources::labour::{
    FilterOperator, LabourAttribute, LabourFilter, LabourFilterGroup, LabourPool, LabourRequirement,
};
use crate::resources::name::ResourceKind;

/// When a resourcing pass runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepContext {
    pub today: SimDate,
    pub step: Step,
}

/// Labour days an activity needs for one requirement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabourDays {
    pub days: f64,
    pub category: String,
    pub relates_to: String,
}

impl LabourDays {
    pub fn new(days: f64) -> Self {
        Self {
            days,
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// Domain behaviour plugged into an activity node
///
/// Every hook has a do-nothing default so simple activities only implement
/// what they use.
pub trait Activity: Debug {
    /// Requests made once when the simulation starts
    fn requests_for_initialisation(&mut self) -> Vec<ResourceRequest> {
        Vec::new()
    }

    /// Requests for this step, excluding labour requirements
    fn requests_for_step(&mut self, _step: &StepContext) -> Vec<ResourceRequest> {
        Vec::new()
    }

    /// Days needed for one of the node's labour requirements
    fn labour_days_required(&self, _requirement: &LabourRequirement, _step: &StepContext) -> LabourDays {
        LabourDays::default()
    }

    /// Change request amounts after availability is known and before anything is taken
    fn adjust_requests(&mut self, _requests: &mut [ResourceRequest]) {}

    /// Perform the domain effect; a returned status replaces the resourcing status
    fn do_activity(&mut self, _step: &StepContext, _requests: &[ResourceRequest]) -> Option<ActivityStatus> {
        None
    }

    /// Child activities created from domain state
    fn dynamic_children(&self) -> Vec<ActivityNode> {
        Vec::new()
    }
}

/// Grouping node with no resources of its own
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityFolder;

impl Activity for ActivityFolder {
    fn do_activity(&mut self, _step: &StepContext, _requests: &[ResourceRequest]) -> Option<ActivityStatus> {
        Some(ActivityStatus::NoTask)
    }
}

#[derive(Debug)]
pub struct ActivityNode {
    pub id: ActivityId,
    pub name: String,
    pub(crate) enabled: bool,
    pub allocation_style: ResourceAllocationStyle,
    pub partial_action: PartialResourcesAvailableAction,
    /// Falls back to the engine default when unset
    pub missing_action: Option<MissingResourceAction>,
    pub(crate) timers: Vec<Box<dyn ActivityTimer>>,
    pub labour_requirements: Vec<LabourRequirement>,
    pub(crate) status: ActivityStatus,
    pub(crate) requests: Vec<ResourceRequest>,
    pub(crate) behaviour: Box<dyn Activity>,
    pub(crate) children: Vec<ActivityNode>,
    pub(crate) dynamic_children: Vec<ActivityNode>,
}

impl ActivityNode {
    pub fn new(id: ActivityId, name: impl Into<String>, behaviour: impl Activity + 'static) -> Self {
        Self {
            id,
            name: name.into(),
            enabled: true,
            allocation_style: ResourceAllocationStyle::Automatic,
            partial_action: PartialResourcesAvailableAction::default(),
            missing_action: None,
            timers: Vec::new(),
            labour_requirements: Vec::new(),
            status: ActivityStatus::Success,
            requests: Vec::new(),
            behaviour: Box::new(behaviour),
            children: Vec::new(),
            dynamic_children: Vec::new(),
        }
    }

    pub fn folder(id: ActivityId, name: impl Into<String>) -> Self {
        Self::new(id, name, ActivityFolder)
    }

    pub fn with_child(mut self, child: ActivityNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_timer(mut self, timer: impl ActivityTimer + 'static) -> Self {
        self.timers.push(Box::new(timer));
        self
    }

    pub fn with_labour_requirement(mut self, requirement: LabourRequirement) -> Self {
        self.labour_requirements.push(requirement);
        self
    }

    pub fn with_partial_action(mut self, action: PartialResourcesAvailableAction) -> Self {
        self.partial_action = action;
        self
    }

    pub fn with_missing_action(mut self, action: MissingResourceAction) -> Self {
        self.missing_action = Some(action);
        self
    }

    pub fn manual(mut self) -> Self {
        self.allocation_style = ResourceAllocationStyle::Manual;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable this node and everything below it
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        for child in self.children.iter_mut().chain(self.dynamic_children.iter_mut()) {
            child.set_enabled(enabled);
        }
    }

    pub fn status(&self) -> ActivityStatus {
        self.status
    }

    pub fn requests(&self) -> &[ResourceRequest] {
        &self.requests
    }

    pub fn children(&self) -> &[ActivityNode] {
        &self.children
    }

    pub fn dynamic_children(&self) -> &[ActivityNode] {
        &self.dynamic_children
    }

    /// Children in walk order: dynamic first, then static
    pub(crate) fn walk_order_mut(&mut self) -> impl Iterator<Item = &mut ActivityNode> {
        self.dynamic_children.iter_mut().chain(self.children.iter_mut())
    }

    /// Whether this node's own timers are due
    pub fn timers_due(&self, today: SimDate) -> bool {
        self.timers.iter().all(|t| t.is_due(today))
    }

    pub fn context(&self, default_missing: MissingResourceAction) -> ActivityContext {
        ActivityContext::new(self.id, self.name.clone())
            .with_partial_action(self.partial_action)
            .with_missing_action(self.missing_action.unwrap_or(default_missing))
    }

    pub fn find(&self, id: ActivityId) -> Option<&ActivityNode> {
        if self.id == id {
            return Some(self);
        }
        self.dynamic_children
            .iter()
            .chain(self.children.iter())
            .find_map(|c| c.find(id))
    }

    pub fn find_mut(&mut self, id: ActivityId) -> Option<&mut ActivityNode> {
        if self.id == id {
            return Some(self);
        }
        self.walk_order_mut().find_map(|c| c.find_mut(id))
    }

    /// Materialise dynamic children from the behaviour, for this node and below
    pub fn rebuild_dynamic_children(&mut self) {
        self.dynamic_children = self.behaviour.dynamic_children();
        if !self.enabled {
            for child in &mut self.dynamic_children {
                child.set_enabled(false);
            }
        }
        for child in self.walk_order_mut() {
            child.rebuild_dynamic_children();
        }
    }

    /// Requests generated from the node's labour requirements
    pub(crate) fn labour_requests(&self, step: &StepContext, labour: Option<&LabourPool>) -> Vec<ResourceRequest> {
        let mut requests = Vec::new();
        for requirement in &self.labour_requirements {
            let needed = self.behaviour.labour_days_required(requirement, step);
            if needed.days <= 0.0 {
                continue;
            }
            let any = [LabourFilterGroup::any()];
            let groups = if requirement.filter_groups.is_empty() {
                &any[..]
            } else {
                &requirement.filter_groups[..]
            };

            for group in groups {
                if requirement.apply_to_all {
                    let members = labour.map(|l| l.members()).unwrap_or(&[]);
                    for member in members.iter().filter(|m| group.matches(m)) {
                        let person = LabourFilterGroup::named(member.name.clone()).with_filter(LabourFilter::new(
                            LabourAttribute::Name,
                            FilterOperator::Equal,
                            member.name.clone(),
                        ));
                        requests.push(labour_request(&needed, requirement, &person));
                    }
                } else {
                    requests.push(labour_request(&needed, requirement, group));
                }
            }
        }
        requests
    }

    /// Product of provided over requested for labour that limits the activity
    pub fn labour_limit_proportion(&self) -> f64 {
        self.requests
            .iter()
            .filter(|r| r.resource_kind == ResourceKind::Labour && r.requested > 0.0)
            .filter(|r| r.labour.as_ref().is_some_and(|c| c.shortfall_affects_activity))
            .map(|r| (r.provided / r.requested).clamp(0.0, 1.0))
            .product()
    }

    /// Share of the requested amount provided for one resource kind
    pub fn limit_proportion(&self, kind: ResourceKind) -> f64 {
        let (requested, provided) = self
            .requests
            .iter()
            .filter(|r| r.resource_kind == kind)
            .fold((0.0, 0.0), |(req, prov), r| (req + r.requested, prov + r.provided));
        if requested <= 0.0 {
            1.0
        } else {
            (provided / requested).clamp(0.0, 1.0)
        }
    }
}

fn labour_request(needed: &LabourDays, requirement: &LabourRequirement, group: &LabourFilterGroup) -> ResourceRequest {
    ResourceRequest::labour(needed.days, requirement.criteria(group))
        .with_category(needed.category.clone())
        .relating_to(needed.relates_to.clone())
}
