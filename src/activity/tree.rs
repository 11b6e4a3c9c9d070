//! Activity tree walker
//!
//! The tree is walked depth first each step. A node that is disabled or whose
//! timers (or an ancestor's timers) are not due is marked `Ignored` with its
//! whole subtree. Every other node runs its own check and take; a parent's
//! status never depends on its children's.

use crate::activity::node::{ActivityNode, StepContext};
use crate::activity::status::{ActivityStatus, ResourceAllocationStyle};
use crate::arbitration::arbiter::Arbiter;
use crate::arbitration::events::ArbitrationEvent;
use crate::arbitration::request::ResourceRequest;
use crate::core::error::{FarmError, Result};
use crate::core::types::{ActivityId, BatchId};
use crate::resources::registry::PoolScope;

/// What started a resourcing walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// The per-step broadcast from the resource holder
    Holder,
    /// A manually allocated activity asking for its own resources
    Activity(ActivityId),
}

#[derive(Debug, Default)]
pub struct ActivityTree {
    roots: Vec<ActivityNode>,
}

impl ActivityTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: ActivityNode) {
        self.roots.push(node);
    }

    pub fn roots(&self) -> &[ActivityNode] {
        &self.roots
    }

    pub fn find(&self, id: ActivityId) -> Option<&ActivityNode> {
        self.roots.iter().find_map(|n| n.find(id))
    }

    pub fn find_mut(&mut self, id: ActivityId) -> Option<&mut ActivityNode> {
        self.roots.iter_mut().find_map(|n| n.find_mut(id))
    }

    pub fn rebuild_dynamic_children(&mut self) {
        for root in &mut self.roots {
            root.rebuild_dynamic_children();
        }
    }

    /// One-time resourcing at simulation start, enabled nodes only
    pub fn gather_resources_for_initialisation(&mut self, arbiter: &mut Arbiter<'_>) -> Result<()> {
        for root in &mut self.roots {
            initialise(root, arbiter)?;
        }
        Ok(())
    }

    /// Per-step resourcing walk over the whole tree
    pub fn gather_resources_for_activities(
        &mut self,
        arbiter: &mut Arbiter<'_>,
        step: &StepContext,
        trigger: TriggerSource,
    ) -> Result<()> {
        for root in &mut self.roots {
            walk(root, arbiter, step, trigger, true)?;
        }
        Ok(())
    }

    /// Resource one activity and its subtree on its own request
    ///
    /// Returns false if no node has `id`.
    pub fn gather_resources_for(
        &mut self,
        id: ActivityId,
        arbiter: &mut Arbiter<'_>,
        step: &StepContext,
    ) -> Result<bool> {
        for root in &mut self.roots {
            if walk_to(root, id, arbiter, step, true)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn initialise(node: &mut ActivityNode, arbiter: &mut Arbiter<'_>) -> Result<()> {
    if !node.enabled {
        return Ok(());
    }
    let ctx = node.context(arbiter.config.default_missing_resource_action);
    let mut requests = node.behaviour.requests_for_initialisation();
    if !requests.is_empty() {
        let mut status = arbiter.check(&ctx, &mut requests, BatchId::new())?;
        arbiter.take(&ctx, &mut requests, &mut status)?;
        node.status = status;
        node.requests = requests;
    }
    for child in node.walk_order_mut() {
        initialise(child, arbiter)?;
    }
    Ok(())
}

fn walk_to(
    node: &mut ActivityNode,
    id: ActivityId,
    arbiter: &mut Arbiter<'_>,
    step: &StepContext,
    ancestors_due: bool,
) -> Result<bool> {
    if node.id == id {
        walk(node, arbiter, step, TriggerSource::Activity(id), ancestors_due)?;
        return Ok(true);
    }
    let due = ancestors_due && node.timers_due(step.today);
    for child in node.walk_order_mut() {
        if walk_to(child, id, arbiter, step, due)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn walk(
    node: &mut ActivityNode,
    arbiter: &mut Arbiter<'_>,
    step: &StepContext,
    trigger: TriggerSource,
    ancestors_due: bool,
) -> Result<()> {
    let due = ancestors_due && node.timers_due(step.today);
    if !node.enabled || !due {
        mark_ignored(node, arbiter);
        return Ok(());
    }

    let runs = match trigger {
        TriggerSource::Holder => node.allocation_style == ResourceAllocationStyle::Automatic,
        TriggerSource::Activity(_) => true,
    };
    if !runs {
        // manual subtrees wait for their own allocation call
        return Ok(());
    }

    run_pass(node, arbiter, step)?;
    for child in node.walk_order_mut() {
        walk(child, arbiter, step, trigger, due)?;
    }
    Ok(())
}

fn run_pass(node: &mut ActivityNode, arbiter: &mut Arbiter<'_>, step: &StepContext) -> Result<()> {
    let ctx = node.context(arbiter.config.default_missing_resource_action);
    let batch = BatchId::new();

    let mut requests = node.labour_requests(step, arbiter.resources.labour(PoolScope::Local));
    requests.extend(node.behaviour.requests_for_step(step));

    let checked = arbiter.check(&ctx, &mut requests, batch);
    let mut status = match checked {
        Ok(status) => status,
        Err(e) => return Err(fail(node, requests, e)),
    };
    node.behaviour.adjust_requests(&mut requests);
    let proceed = match arbiter.take(&ctx, &mut requests, &mut status) {
        Ok(proceed) => proceed,
        Err(e) => return Err(fail(node, requests, e)),
    };

    if proceed || requests.is_empty() {
        if let Some(outcome) = node.behaviour.do_activity(step, &requests) {
            status = outcome;
        }
    }
    tracing::debug!(activity = %node.name, ?status, "activity performed");

    node.status = status;
    node.requests = requests;
    arbiter.observer.notify(ArbitrationEvent::ActivityPerformed {
        activity: node.id,
        activity_name: node.name.clone(),
        status,
    });
    Ok(())
}

/// Record a fatal error on the node before it stops the walk
fn fail(node: &mut ActivityNode, requests: Vec<ResourceRequest>, error: FarmError) -> FarmError {
    node.status = ActivityStatus::Critical;
    node.requests = requests;
    error
}

fn mark_ignored(node: &mut ActivityNode, arbiter: &mut Arbiter<'_>) {
    node.status = ActivityStatus::Ignored;
    node.requests.clear();
    arbiter.observer.notify(ArbitrationEvent::ActivityPerformed {
        activity: node.id,
        activity_name: node.name.clone(),
        status: ActivityStatus::Ignored,
    });
    for child in node.walk_order_mut() {
        mark_ignored(child, arbiter);
    }
}
