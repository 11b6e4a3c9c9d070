//! Transmutation resolver
//!
//! The query pass finds, for a short pool, the first declared transmutation
//! whose every transmute can be paid for, following chains where a source is
//! itself short. Sources are reserved in a running claim map, so a chained
//! top-up only counts if it really covers the deficit and two shortfalls of
//! one batch cannot both be promised the same stock. The commit pass replays
//! the chosen transmutation: it re-plans every source, tops up the short ones,
//! debits them all and only then adds the produced packets to the short pool.

use ahash::AHashMap;

use crate::arbitration::arbiter::{ActivityContext, Arbiter};
use crate::arbitration::request::SuccessfulTransmutation;
use crate::core::error::{FarmError, Result};
use crate::core::types::BatchId;
use crate::resources::labour::LabourCriteria;
use crate::resources::name::ResourceKind;
use crate::resources::pricing::PurchaseOrSale;
use crate::resources::registry::{PoolRef, PoolScope};
use crate::resources::transmutation::{Transmutation, Transmute};

/// Amount already promised from each pool during one resourcing pass
///
/// Starts from the batch's own requests. Production of a pending
/// transmutation counts against its target's claim.
pub(crate) type Claims = AHashMap<PoolRef, f64>;

/// One source debit a transmutation needs
struct SourceNeed {
    pool: PoolRef,
    amount: f64,
}

impl<'a> Arbiter<'a> {
    /// Query pass: first transmutation on `target` able to cover `shortfall`
    ///
    /// On success the chosen transmutation's sources are added to `claims`
    /// and its production is credited to `target`; on failure `claims` is
    /// left as it was.
    pub(crate) fn find_transmutation(
        &mut self,
        ctx: &ActivityContext,
        batch: BatchId,
        target: PoolRef,
        shortfall: f64,
        claims: &mut Claims,
        chain: &mut Vec<PoolRef>,
    ) -> Result<Option<SuccessfulTransmutation>> {
        let transmutations = self.resources.transmutations(target).to_vec();
        for (index, transmutation) in transmutations.iter().enumerate() {
            let packets = self.packets_for(target, transmutation, shortfall);
            if packets <= 0.0 {
                tracing::debug!(
                    activity = %ctx.name,
                    transmutation = %transmutation.name,
                    "shortfall smaller than one whole packet"
                );
                continue;
            }
            let Some(needs) = self.needs_for_packets(ctx, target, transmutation, packets)? else {
                continue;
            };

            let mut trial = claims.clone();
            let mut top_ups = Vec::new();
            let mut feasible = true;
            for need in &needs {
                if !self.claim_source(ctx, batch, need.pool, need.amount, &mut trial, &mut top_ups, chain)? {
                    feasible = false;
                    break;
                }
            }
            if feasible {
                let produced = packets * transmutation.packet_size;
                *trial.entry(target).or_insert(0.0) -= produced;
                *claims = trial;
                return Ok(Some(SuccessfulTransmutation {
                    pool: target,
                    index,
                    packets,
                    produced,
                }));
            }
            tracing::debug!(
                activity = %ctx.name,
                transmutation = %transmutation.name,
                "transmutation infeasible"
            );
        }
        Ok(None)
    }

    /// Commit pass for a transmutation chosen by `find_transmutation`
    ///
    /// `demand` is what the batch itself requests from each pool. Labour
    /// days produced for a labour pool are spread over hired members within
    /// `receiver`'s limits. Returns false, with a warning and nothing
    /// changed, when a source can no longer pay.
    pub(crate) fn commit_transmutation(
        &mut self,
        ctx: &ActivityContext,
        batch: BatchId,
        chosen: SuccessfulTransmutation,
        demand: &Claims,
        chain: &mut Vec<PoolRef>,
        receiver: Option<&LabourCriteria>,
    ) -> Result<bool> {
        let Some(transmutation) = self.resources.transmutations(chosen.pool).get(chosen.index).cloned() else {
            return Ok(false);
        };
        let target_name = self.resources.full_name(chosen.pool);
        let Some(needs) = self.needs_for_packets(ctx, chosen.pool, &transmutation, chosen.packets)? else {
            return Ok(false);
        };

        if chosen.pool.kind == ResourceKind::Labour
            && !self
                .resources
                .labour(chosen.pool.scope)
                .is_some_and(|l| l.members().iter().any(|m| m.hired))
        {
            self.diagnostics.warn(format!(
                "Transmutation [{}] for [r={}] has no hired labour to receive the days",
                transmutation.name, target_name
            ));
            return Ok(false);
        }

        // plan every source against the current balances before touching any
        let mut claims = demand.clone();
        let mut top_ups = Vec::new();
        for need in &needs {
            if !self.claim_source(ctx, batch, need.pool, need.amount, &mut claims, &mut top_ups, chain)? {
                self.diagnostics.warn(format!(
                    "Transmutation [{}] for [r={}] skipped for [a={}]: [r={}] can no longer supply {}",
                    transmutation.name,
                    target_name,
                    ctx.name,
                    self.resources.full_name(need.pool),
                    need.amount
                ));
                return Ok(false);
            }
        }

        for nested in top_ups {
            chain.push(nested.pool);
            let committed = self.commit_transmutation(ctx, batch, nested, demand, chain, None);
            chain.pop();
            if !committed? {
                return Ok(false);
            }
        }

        for need in &needs {
            self.debit_source(ctx, batch, need.pool, need.amount, &transmutation.category)?;
        }

        if chosen.pool.kind == ResourceKind::Labour {
            let criteria = receiver
                .cloned()
                .unwrap_or_else(|| LabourCriteria::unrestricted(self.config.transmutation_labour_max_per_person));
            if let Some(labour) = self.resources.labour_mut(chosen.pool.scope) {
                labour.add_hired_days(chosen.produced, batch, &criteria);
            }
        } else if let Some(store) = self.resources.store_mut(chosen.pool) {
            store.add(chosen.produced, &ctx.name, &transmutation.category)?;
        }
        tracing::debug!(
            activity = %ctx.name,
            transmutation = %transmutation.name,
            resource = %target_name,
            produced = chosen.produced,
            "transmutation committed"
        );
        Ok(true)
    }

    fn packets_for(&self, target: PoolRef, transmutation: &Transmutation, shortfall: f64) -> f64 {
        let pricing = self
            .prices
            .price(&self.resources.full_name(target), PurchaseOrSale::Purchase);
        transmutation.packets_needed(shortfall, pricing.as_ref())
    }

    /// Source debits for `packets`, or None if a source or price is missing
    fn needs_for_packets(
        &mut self,
        ctx: &ActivityContext,
        target: PoolRef,
        transmutation: &Transmutation,
        packets: f64,
    ) -> Result<Option<Vec<SourceNeed>>> {
        let pricing = self
            .prices
            .price(&self.resources.full_name(target), PurchaseOrSale::Purchase);
        let mut needs = Vec::with_capacity(transmutation.transmutes.len());
        for transmute in &transmutation.transmutes {
            let Some(amount) = transmute.source_amount(packets, transmutation.packet_size, pricing.as_ref()) else {
                self.diagnostics.warn(format!(
                    "No purchase price for [r={}] used by transmute [{}]",
                    self.resources.full_name(target),
                    transmute.name
                ));
                return Ok(None);
            };
            let Some(pool) = self.locate_source(ctx, transmute)? else {
                return Ok(None);
            };
            needs.push(SourceNeed { pool, amount });
        }
        Ok(Some(needs))
    }

    fn locate_source(&mut self, ctx: &ActivityContext, transmute: &Transmute) -> Result<Option<PoolRef>> {
        let scope = if transmute.in_market {
            PoolScope::Market
        } else {
            PoolScope::Local
        };
        self.resources.resolve(
            transmute.source_kind,
            &transmute.source,
            scope,
            &ctx.name,
            ctx.missing_action,
            self.diagnostics,
        )
    }

    /// Reserve `amount` of `source` on top of what is already claimed
    ///
    /// A short source is topped up through its own transmutations; the top-up
    /// is pushed to `top_ups` and only counts if what it produces closes the
    /// whole deficit.
    fn claim_source(
        &mut self,
        ctx: &ActivityContext,
        batch: BatchId,
        source: PoolRef,
        amount: f64,
        claims: &mut Claims,
        top_ups: &mut Vec<SuccessfulTransmutation>,
        chain: &mut Vec<PoolRef>,
    ) -> Result<bool> {
        self.guard_chain(ctx, source, chain)?;
        let epsilon = self.config.shortfall_epsilon;
        let required = claims.get(&source).copied().unwrap_or(0.0) + amount;
        let available = self.source_available(source, batch, required);

        if available + epsilon < required {
            chain.push(source);
            let nested = self.find_transmutation(ctx, batch, source, required - available, claims, chain);
            chain.pop();
            let Some(nested) = nested? else {
                return Ok(false);
            };
            // whole packets can round the top-up below the deficit
            let still_required = claims.get(&source).copied().unwrap_or(0.0) + amount;
            if available + epsilon < still_required {
                tracing::debug!(
                    activity = %ctx.name,
                    resource = %self.resources.full_name(source),
                    produced = nested.produced,
                    deficit = required - available,
                    "top-up does not cover the deficit"
                );
                return Ok(false);
            }
            top_ups.push(nested);
        }

        *claims.entry(source).or_insert(0.0) += amount;
        Ok(true)
    }

    /// Fail on a cycle or a chain deeper than configured
    fn guard_chain(&mut self, ctx: &ActivityContext, source: PoolRef, chain: &[PoolRef]) -> Result<()> {
        if chain.contains(&source) {
            let error = FarmError::TransmutationCycle {
                activity: ctx.name.clone(),
                chain: self.render_chain(chain, source),
            };
            self.diagnostics.error(error.to_string());
            return Err(error);
        }
        if chain.len() > self.config.max_transmutation_depth {
            let error = FarmError::TransmutationDepthExceeded {
                activity: ctx.name.clone(),
                depth: self.config.max_transmutation_depth,
                chain: self.render_chain(chain, source),
            };
            self.diagnostics.error(error.to_string());
            return Err(error);
        }
        Ok(())
    }

    fn render_chain(&self, chain: &[PoolRef], last: PoolRef) -> String {
        chain
            .iter()
            .chain(std::iter::once(&last))
            .map(|&pool| self.resources.full_name(pool))
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    fn source_available(&self, source: PoolRef, batch: BatchId, required: f64) -> f64 {
        if source.kind == ResourceKind::Labour {
            let criteria = LabourCriteria::unrestricted(self.config.transmutation_labour_max_per_person);
            return self
                .resources
                .labour(source.scope)
                .map_or(0.0, |l| l.plan(batch, required, &criteria, true).provided);
        }
        self.resources.amount(source)
    }

    fn debit_source(
        &mut self,
        ctx: &ActivityContext,
        batch: BatchId,
        source: PoolRef,
        amount: f64,
        category: &str,
    ) -> Result<()> {
        if source.kind == ResourceKind::Labour {
            let criteria = LabourCriteria::unrestricted(self.config.transmutation_labour_max_per_person);
            if let Some(labour) = self.resources.labour_mut(source.scope) {
                let plan = labour.plan(batch, amount, &criteria, true);
                labour.commit(batch, &plan)?;
            }
            return Ok(());
        }
        let store = self.resources.store_mut(source).ok_or_else(|| {
            FarmError::InvalidConfiguration(format!("Transmute source {:?} no longer exists", source))
        })?;
        store.remove(amount, &ctx.name, category)?;
        Ok(())
    }
}
