//! Allocation orchestrator
//!
//! `check` works out what each request of a batch can receive, asks the
//! transmutation resolver to cover shortfalls and reports what is still
//! short. `take` applies the activity's partial policy and debits the pools.
//! Only transmutation commits and `take` change pool balances.

use ahash::AHashMap;

use crate::activity::status::ActivityStatus;
use crate::arbitration::events::{ArbitrationEvent, ArbitrationObserver, ShortfallRoute};
use crate::arbitration::policy::{MissingResourceAction, PartialResourcesAvailableAction};
use crate::arbitration::request::{PoolResolution, ResourceRequest};
use crate::core::config::EngineConfig;
use crate::core::diagnostics::Diagnostics;
use crate::core::error::{FarmError, Result};
use crate::core::types::{ActivityId, BatchId};
use crate::resources::labour::{LabourCriteria, LabourPool};
use crate::resources::name::ResourceKind;
use crate::resources::pricing::PriceLookup;
use crate::resources::registry::{PoolRef, PoolScope, ResourceHolder};

/// The activity a batch of requests belongs to
#[derive(Debug, Clone)]
pub struct ActivityContext {
    pub id: ActivityId,
    pub name: String,
    pub partial_action: PartialResourcesAvailableAction,
    pub missing_action: MissingResourceAction,
}

impl ActivityContext {
    pub fn new(id: ActivityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            partial_action: PartialResourcesAvailableAction::default(),
            missing_action: MissingResourceAction::default(),
        }
    }

    pub fn with_partial_action(mut self, action: PartialResourcesAvailableAction) -> Self {
        self.partial_action = action;
        self
    }

    pub fn with_missing_action(mut self, action: MissingResourceAction) -> Self {
        self.missing_action = action;
        self
    }
}

/// Borrowed view of everything arbitration needs for one pass
pub struct Arbiter<'a> {
    pub resources: &'a mut ResourceHolder,
    pub prices: &'a dyn PriceLookup,
    pub config: &'a EngineConfig,
    pub diagnostics: &'a mut Diagnostics,
    pub observer: &'a mut dyn ArbitrationObserver,
}

impl<'a> Arbiter<'a> {
    pub fn new(
        resources: &'a mut ResourceHolder,
        prices: &'a dyn PriceLookup,
        config: &'a EngineConfig,
        diagnostics: &'a mut Diagnostics,
        observer: &'a mut dyn ArbitrationObserver,
    ) -> Self {
        Self {
            resources,
            prices,
            config,
            diagnostics,
            observer,
        }
    }

    /// Compute availability for a batch, covering shortfalls by transmutation
    pub fn check(
        &mut self,
        ctx: &ActivityContext,
        requests: &mut [ResourceRequest],
        batch: BatchId,
    ) -> Result<ActivityStatus> {
        if requests.is_empty() {
            return Ok(ActivityStatus::Success);
        }

        for request in requests.iter_mut() {
            request.batch = Some(batch);
            self.resolve(ctx, request)?;
        }
        self.measure_all(requests, batch, ctx.partial_action.allows_partial())?;

        let epsilon = self.config.shortfall_epsilon;
        let transmutable: Vec<usize> = requests
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_short(epsilon) && r.allow_transmutation && r.pool().is_some())
            .map(|(i, _)| i)
            .collect();

        if !transmutable.is_empty() {
            let demand = batch_demand(requests);
            // later shortfalls see what earlier ones were promised
            let mut claims = demand.clone();
            let mut any_feasible = false;
            let mut all_feasible = true;
            for &i in &transmutable {
                requests[i].successful_transmutation = None;
                let Some(pool) = requests[i].pool() else {
                    continue;
                };
                let shortfall = self.transmutable_shortfall(&requests[i], pool, batch);
                if shortfall <= epsilon {
                    all_feasible = false;
                    continue;
                }
                let mut chain = vec![pool];
                let found = self.find_transmutation(ctx, batch, pool, shortfall, &mut claims, &mut chain)?;
                match found {
                    Some(transmutation) => {
                        tracing::debug!(
                            activity = %ctx.name,
                            resource = %self.resources.full_name(pool),
                            packets = transmutation.packets,
                            "transmutation feasible"
                        );
                        requests[i].successful_transmutation = Some(transmutation);
                        any_feasible = true;
                    }
                    None => all_feasible = false,
                }
            }

            if any_feasible && (all_feasible || ctx.partial_action.allows_partial()) {
                for &i in &transmutable {
                    if let Some(transmutation) = requests[i].successful_transmutation {
                        let receiver = self.criteria_for(&requests[i]);
                        let mut chain = vec![transmutation.pool];
                        self.commit_transmutation(ctx, batch, transmutation, &demand, &mut chain, Some(&receiver))?;
                    }
                }
                // a top-up can serve every request drawing on that pool
                self.measure_all(requests, batch, ctx.partial_action.allows_partial())?;
            }
        }

        let mut status = ActivityStatus::Success;
        for request in requests.iter() {
            if !request.is_short(epsilon) {
                continue;
            }
            status = ActivityStatus::Partial;
            let resource = match request.pool() {
                Some(pool) => self.resources.full_name(pool),
                None => request.display_name(),
            };
            let route = match request.scope {
                PoolScope::Market => ShortfallRoute::Market,
                PoolScope::Local => ShortfallRoute::Activity,
            };
            tracing::warn!(
                activity = %ctx.name,
                resource = %resource,
                requested = request.requested,
                available = request.available,
                "resource shortfall"
            );
            self.observer.notify(ArbitrationEvent::Shortfall {
                activity: ctx.id,
                activity_name: ctx.name.clone(),
                resource,
                requested: request.requested,
                available: request.available,
                route,
            });
        }
        Ok(status)
    }

    /// Debit the pools for a checked batch
    ///
    /// Returns whether the activity went ahead. `status` becomes `Ignored`
    /// when a shortfall skips the activity, or `Critical` before a fatal stop.
    pub fn take(
        &mut self,
        ctx: &ActivityContext,
        requests: &mut [ResourceRequest],
        status: &mut ActivityStatus,
    ) -> Result<bool> {
        if requests.is_empty() {
            return Ok(false);
        }

        let epsilon = self.config.shortfall_epsilon;
        let short: Vec<String> = requests
            .iter()
            .filter(|r| r.is_short(epsilon))
            .map(|r| match r.pool() {
                Some(pool) => self.resources.full_name(pool),
                None => r.display_name(),
            })
            .collect();

        if !short.is_empty() {
            match ctx.partial_action {
                PartialResourcesAvailableAction::SkipActivity => {
                    for request in requests.iter_mut() {
                        request.provided = 0.0;
                    }
                    *status = ActivityStatus::Ignored;
                    tracing::debug!(activity = %ctx.name, "skipped on insufficient resources");
                    return Ok(false);
                }
                PartialResourcesAvailableAction::ReportErrorAndStop => {
                    let error = FarmError::InsufficientResources {
                        activity: ctx.name.clone(),
                        resources: short.join(", "),
                    };
                    self.diagnostics.error(error.to_string());
                    *status = ActivityStatus::Critical;
                    return Err(error);
                }
                PartialResourcesAvailableAction::UseResourcesAvailable => {}
            }
        }

        let batch = requests.iter().find_map(|r| r.batch).unwrap_or_default();
        for request in requests.iter_mut() {
            self.debit(ctx, batch, request)?;
        }
        Ok(*status != ActivityStatus::Ignored)
    }

    fn resolve(&mut self, ctx: &ActivityContext, request: &mut ResourceRequest) -> Result<()> {
        if request.resolution != PoolResolution::Unresolved {
            return Ok(());
        }
        let found = self.resources.resolve(
            request.resource_kind,
            &request.resource_type_name,
            request.scope,
            &ctx.name,
            ctx.missing_action,
            self.diagnostics,
        )?;
        request.resolution = match found {
            Some(pool) => PoolResolution::Found(pool),
            None => PoolResolution::Absent,
        };
        Ok(())
    }

    /// Non-mutating availability check for every request in list order
    ///
    /// Requests sharing a pool are measured against what the earlier ones
    /// would leave, so taking all of them never overdraws.
    fn measure_all(&self, requests: &mut [ResourceRequest], batch: BatchId, allow_partial: bool) -> Result<()> {
        let mut claimed: AHashMap<PoolRef, f64> = AHashMap::new();
        let mut scratch: AHashMap<PoolScope, LabourPool> = AHashMap::new();

        for request in requests.iter_mut() {
            request.limited_by_labour_minimum = false;
            let pool = match request.resolution {
                PoolResolution::Found(pool) => pool,
                PoolResolution::Absent | PoolResolution::Unresolved => {
                    request.available = request.requested;
                    request.provided = request.requested;
                    continue;
                }
            };

            if pool.kind == ResourceKind::Labour {
                let Some(labour) = self.resources.labour(pool.scope) else {
                    request.available = 0.0;
                    continue;
                };
                let labour = scratch.entry(pool.scope).or_insert_with(|| labour.clone());
                let criteria = self.criteria_for(request);
                let plan = labour.plan(batch, request.requested, &criteria, allow_partial);
                request.available = plan.provided.min(request.requested);
                request.limited_by_labour_minimum = plan.limited_by_minimum;
                labour.commit(batch, &plan)?;
            } else {
                let taken = claimed.entry(pool).or_insert(0.0);
                let left = (self.resources.amount(pool) - *taken).max(0.0);
                request.available = left.min(request.requested);
                *taken += request.available;
            }
        }
        Ok(())
    }

    /// Part of a request's shortfall a transmutation may cover
    ///
    /// Bought labour days land on hired members, so a labour shortfall is
    /// capped at what they can still give under the request's limits.
    fn transmutable_shortfall(&self, request: &ResourceRequest, pool: PoolRef, batch: BatchId) -> f64 {
        let shortfall = request.shortfall();
        if pool.kind != ResourceKind::Labour {
            return shortfall;
        }
        let criteria = self.criteria_for(request);
        let headroom = self
            .resources
            .labour(pool.scope)
            .map_or(0.0, |l| l.hired_headroom(batch, &criteria));
        shortfall.min(headroom)
    }

    fn criteria_for(&self, request: &ResourceRequest) -> LabourCriteria {
        request
            .labour
            .clone()
            .unwrap_or_else(|| LabourCriteria::unrestricted(self.config.transmutation_labour_max_per_person))
    }

    fn debit(&mut self, ctx: &ActivityContext, batch: BatchId, request: &mut ResourceRequest) -> Result<()> {
        let Some(pool) = request.pool() else {
            request.provided = request.requested;
            return Ok(());
        };
        let amount = request.requested.min(request.available);

        if pool.kind == ResourceKind::Labour {
            let criteria = self.criteria_for(request);
            let allow_partial = ctx.partial_action.allows_partial();
            let Some(labour) = self.resources.labour_mut(pool.scope) else {
                request.provided = 0.0;
                return Ok(());
            };
            let plan = labour.plan(batch, amount, &criteria, allow_partial);
            request.value += labour.commit(batch, &plan)?;
            request.provided = plan.provided.min(amount);
        } else {
            let category = request.category.clone();
            let store = self.resources.store_mut(pool).ok_or_else(|| {
                FarmError::InvalidConfiguration(format!("Resource pool {:?} no longer exists", pool))
            })?;
            request.provided = store.remove(amount, &ctx.name, &category)?;
        }
        tracing::debug!(
            activity = %ctx.name,
            resource = %request.display_name(),
            provided = request.provided,
            "resource taken"
        );
        Ok(())
    }
}

/// Total requested from each pool by a batch
fn batch_demand(requests: &[ResourceRequest]) -> AHashMap<PoolRef, f64> {
    let mut demand = AHashMap::new();
    for request in requests {
        if let Some(pool) = request.pool() {
            *demand.entry(pool).or_insert(0.0) += request.requested;
        }
    }
    demand
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitration::events::EventLog;
    use crate::resources::pricing::PriceList;
    use crate::resources::registry::ResourceGroup;
    use crate::resources::store::ResourceStore;

    fn hay_holder(amount: f64) -> ResourceHolder {
        let mut holder = ResourceHolder::new();
        holder
            .add_group(
                ResourceGroup::new(ResourceKind::AnimalFoodStore).with_store(ResourceStore::new("Hay", amount)),
            )
            .unwrap();
        holder
    }

    fn context(action: PartialResourcesAvailableAction) -> ActivityContext {
        ActivityContext::new(ActivityId(1), "Feed cattle").with_partial_action(action)
    }

    #[test]
    fn test_empty_batch() {
        let mut holder = hay_holder(10.0);
        let prices = PriceList::new();
        let config = EngineConfig::default();
        let mut diagnostics = Diagnostics::new();
        let mut log = EventLog::new();
        let mut arbiter = Arbiter::new(&mut holder, &prices, &config, &mut diagnostics, &mut log);

        let ctx = context(PartialResourcesAvailableAction::ReportErrorAndStop);
        let mut requests: Vec<ResourceRequest> = Vec::new();
        let mut status = arbiter.check(&ctx, &mut requests, BatchId::new()).unwrap();
        assert_eq!(status, ActivityStatus::Success);
        assert!(!arbiter.take(&ctx, &mut requests, &mut status).unwrap());
    }

    #[test]
    fn test_requests_sharing_a_pool_never_overdraw() {
        let mut holder = hay_holder(100.0);
        let prices = PriceList::new();
        let config = EngineConfig::default();
        let mut diagnostics = Diagnostics::new();
        let mut log = EventLog::new();
        let mut arbiter = Arbiter::new(&mut holder, &prices, &config, &mut diagnostics, &mut log);

        let ctx = context(PartialResourcesAvailableAction::UseResourcesAvailable);
        let mut requests = vec![
            ResourceRequest::new(ResourceKind::AnimalFoodStore, "Hay", 60.0),
            ResourceRequest::new(ResourceKind::AnimalFoodStore, "Hay", 60.0),
        ];
        let mut status = arbiter.check(&ctx, &mut requests, BatchId::new()).unwrap();
        assert_eq!(status, ActivityStatus::Partial);
        assert!((requests[0].available - 60.0).abs() < 1e-9);
        assert!((requests[1].available - 40.0).abs() < 1e-9);

        assert!(arbiter.take(&ctx, &mut requests, &mut status).unwrap());
        let pool = holder.locate(ResourceKind::AnimalFoodStore, "Hay", PoolScope::Local).unwrap();
        assert!(holder.amount(pool).abs() < 1e-9);
    }

    #[test]
    fn test_stop_policy_names_every_short_resource() {
        let mut holder = hay_holder(5.0);
        holder
            .add_group(ResourceGroup::new(ResourceKind::Finance).with_store(ResourceStore::new("Bank", 1.0)))
            .unwrap();
        let prices = PriceList::new();
        let config = EngineConfig::default();
        let mut diagnostics = Diagnostics::new();
        let mut log = EventLog::new();
        let mut arbiter = Arbiter::new(&mut holder, &prices, &config, &mut diagnostics, &mut log);

        let ctx = context(PartialResourcesAvailableAction::ReportErrorAndStop);
        let mut requests = vec![
            ResourceRequest::new(ResourceKind::AnimalFoodStore, "Hay", 10.0),
            ResourceRequest::new(ResourceKind::Finance, "Bank", 10.0),
        ];
        let mut status = arbiter.check(&ctx, &mut requests, BatchId::new()).unwrap();
        let result = arbiter.take(&ctx, &mut requests, &mut status);
        match result {
            Err(FarmError::InsufficientResources { activity, resources }) => {
                assert_eq!(activity, "Feed cattle");
                assert_eq!(resources, "AnimalFoodStore.Hay, Finance.Bank");
            }
            other => panic!("Expected insufficient resources, got {:?}", other),
        }
        assert_eq!(status, ActivityStatus::Critical);
        assert_eq!(diagnostics.errors().count(), 1);
    }
}
