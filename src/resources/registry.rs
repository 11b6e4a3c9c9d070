//! Resource pool registry
//!
//! A `ResourceHolder` owns every resource group of a farm, keyed by kind, and
//! optionally an outer market holder. Pools are addressed by `PoolRef`, a
//! plain index that borrows nothing and is resolved again on each use.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::arbitration::policy::MissingResourceAction;
use crate::core::diagnostics::Diagnostics;
use crate::core::error::{FarmError, Result};
use crate::resources::labour::LabourPool;
use crate::resources::name::{ResourceKind, ResourceName};
use crate::resources::store::ResourceStore;
use crate::resources::transmutation::Transmutation;

/// Which holder a pool lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PoolScope {
    #[default]
    Local,
    Market,
}

/// Weak reference to a located pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolRef {
    pub scope: PoolScope,
    pub kind: ResourceKind,
    /// Store index within the group (always 0 for labour)
    pub index: usize,
}

/// All resource types of one kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceGroup {
    pub kind: ResourceKind,
    pub name: String,
    #[serde(default)]
    pub stores: Vec<ResourceStore>,
}

impl ResourceGroup {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            name: kind.name().to_string(),
            stores: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_store(mut self, store: ResourceStore) -> Self {
        self.stores.push(store);
        self
    }

    fn position(&self, item: &str) -> Option<usize> {
        self.stores.iter().position(|s| s.name == item)
    }
}

/// Registry of resource groups
#[derive(Debug, Clone, Default)]
pub struct ResourceHolder {
    groups: Vec<ResourceGroup>,
    by_kind: AHashMap<ResourceKind, usize>,
    labour: Option<LabourPool>,
    market: Option<Box<ResourceHolder>>,
}

impl ResourceHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group; one group per kind and unique type names within it
    pub fn add_group(&mut self, group: ResourceGroup) -> Result<()> {
        if group.kind == ResourceKind::Labour {
            return Err(FarmError::InvalidConfiguration(format!(
                "Labour group [{}] must be registered as a labour pool",
                group.name
            )));
        }
        if self.by_kind.contains_key(&group.kind) {
            return Err(FarmError::InvalidConfiguration(format!(
                "Only one resource group of kind [{}] is permitted",
                group.kind
            )));
        }
        for (i, store) in group.stores.iter().enumerate() {
            if group.stores[..i].iter().any(|s| s.name == store.name) {
                return Err(FarmError::InvalidConfiguration(format!(
                    "Duplicate resource type [r={}.{}]",
                    group.name, store.name
                )));
            }
            for transmutation in &store.transmutations {
                transmutation.validate(&format!("{}.{}", group.name, store.name))?;
            }
        }
        self.by_kind.insert(group.kind, self.groups.len());
        self.groups.push(group);
        Ok(())
    }

    pub fn set_labour(&mut self, pool: LabourPool) -> Result<()> {
        if self.labour.is_some() {
            return Err(FarmError::InvalidConfiguration(
                "Only one labour pool is permitted".into(),
            ));
        }
        for transmutation in &pool.transmutations {
            transmutation.validate(&pool.name)?;
        }
        self.labour = Some(pool);
        Ok(())
    }

    pub fn set_market(&mut self, market: ResourceHolder) {
        self.market = Some(Box::new(market));
    }

    pub fn market(&self) -> Option<&ResourceHolder> {
        self.market.as_deref()
    }

    pub fn groups(&self) -> &[ResourceGroup] {
        &self.groups
    }

    pub fn group(&self, kind: ResourceKind) -> Option<&ResourceGroup> {
        self.by_kind.get(&kind).map(|&i| &self.groups[i])
    }

    fn group_named(&self, name: &str) -> Option<&ResourceGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    fn scoped(&self, scope: PoolScope) -> Option<&ResourceHolder> {
        match scope {
            PoolScope::Local => Some(self),
            PoolScope::Market => self.market.as_deref(),
        }
    }

    fn scoped_mut(&mut self, scope: PoolScope) -> Option<&mut ResourceHolder> {
        match scope {
            PoolScope::Local => Some(self),
            PoolScope::Market => self.market.as_deref_mut(),
        }
    }

    /// Locate a pool without any reporting
    pub fn locate(&self, kind: ResourceKind, item: &str, scope: PoolScope) -> Option<PoolRef> {
        let holder = self.scoped(scope)?;
        if kind == ResourceKind::Labour {
            return holder.labour.as_ref().map(|_| PoolRef {
                scope,
                kind,
                index: 0,
            });
        }
        let group = holder.group(kind)?;
        group.position(item).map(|index| PoolRef { scope, kind, index })
    }

    /// Find a pool by kind and type name, applying `action` when it is absent
    pub fn find_pool(
        &self,
        kind: ResourceKind,
        item: &str,
        scope: PoolScope,
        requester: &str,
        action: MissingResourceAction,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<PoolRef>> {
        if let Some(found) = self.locate(kind, item, scope) {
            return Ok(Some(found));
        }
        let holder = self.scoped(scope);
        let error = match holder.and_then(|h| h.group(kind)) {
            Some(group) => FarmError::MissingResourceType {
                activity: requester.to_string(),
                group: group.name.clone(),
                resource: item.to_string(),
            },
            None => FarmError::MissingResourceGroup {
                activity: requester.to_string(),
                group: kind.name().to_string(),
            },
        };
        missing(action, diagnostics, error)
    }

    /// Find a pool by group name and type name, applying `action` when it is absent
    pub fn find_pool_by_name(
        &self,
        group_name: &str,
        item: &str,
        scope: PoolScope,
        requester: &str,
        action: MissingResourceAction,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<PoolRef>> {
        let holder = self.scoped(scope);
        if let Some(labour) = holder.and_then(|h| h.labour.as_ref()) {
            if labour.name == group_name {
                return Ok(Some(PoolRef {
                    scope,
                    kind: ResourceKind::Labour,
                    index: 0,
                }));
            }
        }
        match holder.and_then(|h| h.group_named(group_name)) {
            Some(group) => match group.position(item) {
                Some(index) => Ok(Some(PoolRef {
                    scope,
                    kind: group.kind,
                    index,
                })),
                None => missing(
                    action,
                    diagnostics,
                    FarmError::MissingResourceType {
                        activity: requester.to_string(),
                        group: group_name.to_string(),
                        resource: item.to_string(),
                    },
                ),
            },
            None => missing(
                action,
                diagnostics,
                FarmError::MissingResourceGroup {
                    activity: requester.to_string(),
                    group: group_name.to_string(),
                },
            ),
        }
    }

    /// Resolve a `"Group.Type"` or `"Type"` identifier of the given kind
    ///
    /// A group name that matches no group falls back to the group of `kind`
    /// with a warning. A malformed identifier is always an error.
    pub fn resolve(
        &self,
        kind: ResourceKind,
        name: &str,
        scope: PoolScope,
        requester: &str,
        action: MissingResourceAction,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<PoolRef>> {
        let parsed = ResourceName::parse(name).ok_or_else(|| FarmError::InvalidResourceName {
            activity: requester.to_string(),
            name: name.to_string(),
        })?;
        let Some(group_name) = parsed.group else {
            return self.find_pool(kind, &parsed.item, scope, requester, action, diagnostics);
        };

        let holder = self.scoped(scope);
        let named_exists = holder.is_some_and(|h| {
            h.group_named(&group_name).is_some()
                || h.labour.as_ref().is_some_and(|l| l.name == group_name)
        });
        if named_exists {
            return self.find_pool_by_name(&group_name, &parsed.item, scope, requester, action, diagnostics);
        }
        if let Some(group) = holder.and_then(|h| h.group(kind)) {
            diagnostics.warn(format!(
                "Resource group [r={}] not found for [a={}], using [r={}] of kind [{}]",
                group_name, requester, group.name, kind
            ));
        }
        self.find_pool(kind, &parsed.item, scope, requester, action, diagnostics)
    }

    pub fn store(&self, pool: PoolRef) -> Option<&ResourceStore> {
        let group = self.scoped(pool.scope)?.group(pool.kind)?;
        group.stores.get(pool.index)
    }

    pub fn store_mut(&mut self, pool: PoolRef) -> Option<&mut ResourceStore> {
        let holder = self.scoped_mut(pool.scope)?;
        let &group = holder.by_kind.get(&pool.kind)?;
        holder.groups[group].stores.get_mut(pool.index)
    }

    pub fn labour(&self, scope: PoolScope) -> Option<&LabourPool> {
        self.scoped(scope)?.labour.as_ref()
    }

    pub fn labour_mut(&mut self, scope: PoolScope) -> Option<&mut LabourPool> {
        self.scoped_mut(scope)?.labour.as_mut()
    }

    /// Current amount held by a pool (labour reports its available days)
    pub fn amount(&self, pool: PoolRef) -> f64 {
        if pool.kind == ResourceKind::Labour {
            return self.labour(pool.scope).map_or(0.0, LabourPool::total_available);
        }
        self.store(pool).map_or(0.0, ResourceStore::amount)
    }

    pub fn transmutations(&self, pool: PoolRef) -> &[Transmutation] {
        if pool.kind == ResourceKind::Labour {
            return match self.labour(pool.scope) {
                Some(labour) => &labour.transmutations,
                None => &[],
            };
        }
        match self.store(pool) {
            Some(store) => &store.transmutations,
            None => &[],
        }
    }

    /// `"Group.Type"` name of a pool
    pub fn full_name(&self, pool: PoolRef) -> String {
        if pool.kind == ResourceKind::Labour {
            return self
                .labour(pool.scope)
                .map_or_else(|| pool.kind.name().to_string(), |l| l.name.clone());
        }
        let group = self.scoped(pool.scope).and_then(|h| h.group(pool.kind));
        match group.and_then(|g| g.stores.get(pool.index).map(|s| (g, s))) {
            Some((group, store)) => format!("{}.{}", group.name, store.name),
            None => format!("{}.#{}", pool.kind, pool.index),
        }
    }

    /// Restore labour availability for a new step, market included
    pub fn refresh_labour(&mut self) {
        if let Some(labour) = self.labour.as_mut() {
            labour.refresh_availability();
        }
        if let Some(market) = self.market.as_deref_mut() {
            market.refresh_labour();
        }
    }
}

fn missing(
    action: MissingResourceAction,
    diagnostics: &mut Diagnostics,
    error: FarmError,
) -> Result<Option<PoolRef>> {
    match action {
        MissingResourceAction::Ignore => Ok(None),
        MissingResourceAction::ReportWarning => {
            diagnostics.warn(error.to_string());
            Ok(None)
        }
        MissingResourceAction::ReportErrorAndStop => {
            diagnostics.error(error.to_string());
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::labour::{LabourMember, Sex};

    fn holder() -> ResourceHolder {
        let mut holder = ResourceHolder::new();
        holder
            .add_group(
                ResourceGroup::new(ResourceKind::AnimalFoodStore)
                    .with_store(ResourceStore::new("Hay", 100.0))
                    .with_store(ResourceStore::new("Lucerne", 20.0)),
            )
            .unwrap();
        holder
            .add_group(ResourceGroup::new(ResourceKind::Finance).with_store(ResourceStore::new("Bank", 500.0)))
            .unwrap();
        let mut labour = LabourPool::new("Labour");
        labour.add_member(LabourMember::new("Alice", 35.0, Sex::Female, 20.0));
        holder.set_labour(labour).unwrap();
        holder
    }

    #[test]
    fn test_locate_by_kind() {
        let holder = holder();
        let pool = holder
            .locate(ResourceKind::AnimalFoodStore, "Lucerne", PoolScope::Local)
            .unwrap();
        assert_eq!(pool.index, 1);
        assert_eq!(holder.full_name(pool), "AnimalFoodStore.Lucerne");
        assert!((holder.amount(pool) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_kind_rejected() {
        let mut holder = holder();
        let result = holder.add_group(ResourceGroup::new(ResourceKind::Finance).named("Other"));
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let mut holder = ResourceHolder::new();
        let group = ResourceGroup::new(ResourceKind::Land)
            .with_store(ResourceStore::new("Paddock", 10.0))
            .with_store(ResourceStore::new("Paddock", 5.0));
        assert!(holder.add_group(group).is_err());
    }

    #[test]
    fn test_missing_resource_actions() {
        let holder = holder();
        let mut diagnostics = Diagnostics::new();

        let ignored = holder
            .find_pool(
                ResourceKind::Equipment,
                "Tractor",
                PoolScope::Local,
                "Ploughing",
                MissingResourceAction::Ignore,
                &mut diagnostics,
            )
            .unwrap();
        assert!(ignored.is_none());
        assert!(diagnostics.is_empty());

        let warned = holder
            .find_pool(
                ResourceKind::AnimalFoodStore,
                "Silage",
                PoolScope::Local,
                "Feeding",
                MissingResourceAction::ReportWarning,
                &mut diagnostics,
            )
            .unwrap();
        assert!(warned.is_none());
        assert_eq!(diagnostics.warnings().count(), 1);

        let stopped = holder.find_pool(
            ResourceKind::AnimalFoodStore,
            "Silage",
            PoolScope::Local,
            "Feeding",
            MissingResourceAction::ReportErrorAndStop,
            &mut diagnostics,
        );
        assert!(matches!(stopped, Err(FarmError::MissingResourceType { .. })));
        assert_eq!(diagnostics.errors().count(), 1);
    }

    #[test]
    fn test_resolve_full_name() {
        let holder = holder();
        let mut diagnostics = Diagnostics::new();
        let pool = holder
            .resolve(
                ResourceKind::Finance,
                "Finance.Bank",
                PoolScope::Local,
                "Buy",
                MissingResourceAction::ReportErrorAndStop,
                &mut diagnostics,
            )
            .unwrap()
            .unwrap();
        assert_eq!(pool.kind, ResourceKind::Finance);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_resolve_wrong_group_falls_back_to_kind() {
        let holder = holder();
        let mut diagnostics = Diagnostics::new();
        let pool = holder
            .resolve(
                ResourceKind::Finance,
                "Money.Bank",
                PoolScope::Local,
                "Buy",
                MissingResourceAction::Ignore,
                &mut diagnostics,
            )
            .unwrap();
        assert!(pool.is_some());
        assert_eq!(diagnostics.warnings().count(), 1);
    }

    #[test]
    fn test_resolve_invalid_name() {
        let holder = holder();
        let mut diagnostics = Diagnostics::new();
        let result = holder.resolve(
            ResourceKind::Finance,
            "A.B.C",
            PoolScope::Local,
            "Buy",
            MissingResourceAction::Ignore,
            &mut diagnostics,
        );
        assert!(matches!(result, Err(FarmError::InvalidResourceName { .. })));
    }

    #[test]
    fn test_labour_pool_located_by_kind() {
        let holder = holder();
        let pool = holder.locate(ResourceKind::Labour, "", PoolScope::Local).unwrap();
        assert!((holder.amount(pool) - 20.0).abs() < 1e-9);
        assert_eq!(holder.full_name(pool), "Labour");
    }

    #[test]
    fn test_market_scope() {
        let mut holder = holder();
        let mut market = ResourceHolder::new();
        market
            .add_group(ResourceGroup::new(ResourceKind::Finance).with_store(ResourceStore::new("Bank", 1e6)))
            .unwrap();
        holder.set_market(market);

        let local = holder.locate(ResourceKind::Finance, "Bank", PoolScope::Local).unwrap();
        let shared = holder.locate(ResourceKind::Finance, "Bank", PoolScope::Market).unwrap();
        assert!((holder.amount(local) - 500.0).abs() < 1e-9);
        assert!((holder.amount(shared) - 1e6).abs() < 1e-3);
        assert!(holder
            .locate(ResourceKind::AnimalFoodStore, "Hay", PoolScope::Market)
            .is_none());
    }
}
