//! Labour pool - a structured pool of individual workers
//!
//! Labour is not a scalar store. A request for labour days is filled from
//! members selected by filter groups and bounded by per person limits.
//!
//! Allocation runs in two passes per filter group:
//! 1. Whole task: the member with the least remaining capacity that can still
//!    cover the entire outstanding need (tightest fit first).
//! 2. Part task (only when partial resources are acceptable): members in
//!    descending order of remaining capacity until the need is met.
//!
//! When the need is still unmet the group's fallback group is tried next.
//! Planning never mutates the pool; committing a plan applies the debits.

use ahash::AHashMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use crate::core::error::{FarmError, Result};
use crate::core::types::BatchId;
use crate::resources::transmutation::Transmutation;

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

/// Days already given by a member to one resourcing batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabourRequestMemo {
    pub batch: BatchId,
    pub amount: f64,
}

/// A person in the labour pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabourMember {
    pub name: String,
    pub age: f64,
    pub sex: Sex,
    #[serde(default)]
    pub hired: bool,
    #[serde(default)]
    pub attributes: AHashMap<String, String>,
    /// Days available each step
    pub capacity: f64,
    /// Days still available this step
    #[serde(default)]
    pub available: f64,
    #[serde(default)]
    pub pay_rate: f64,
    #[serde(skip)]
    last_request: Option<LabourRequestMemo>,
}

impl LabourMember {
    pub fn new(name: impl Into<String>, age: f64, sex: Sex, capacity: f64) -> Self {
        Self {
            name: name.into(),
            age,
            sex,
            hired: false,
            attributes: AHashMap::new(),
            capacity,
            available: capacity,
            pay_rate: 0.0,
            last_request: None,
        }
    }

    pub fn hired(mut self) -> Self {
        self.hired = true;
        self
    }

    pub fn with_pay_rate(mut self, pay_rate: f64) -> Self {
        self.pay_rate = pay_rate;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn last_request(&self) -> Option<LabourRequestMemo> {
        self.last_request
    }

    /// Days already given to `batch`
    pub fn given_to(&self, batch: BatchId) -> f64 {
        match self.last_request {
            Some(memo) if memo.batch == batch => memo.amount,
            _ => 0.0,
        }
    }

    /// Days this member can still give to `batch` under the per person maximum
    pub fn available_for(&self, batch: BatchId, max_per_person: f64) -> f64 {
        let allowance = (max_per_person - self.given_to(batch)).max(0.0);
        self.available.min(allowance).max(0.0)
    }

    /// Days that could be added before the per person maximum stops them being used
    fn headroom(&self, batch: BatchId, max_per_person: f64) -> f64 {
        let allowance = (max_per_person - self.given_to(batch)).max(0.0);
        (allowance - self.available).max(0.0)
    }

    fn take(&mut self, batch: BatchId, amount: f64) -> Result<()> {
        if amount > self.available + EPSILON {
            return Err(FarmError::LabourOverdraw {
                member: self.name.clone(),
                requested: amount,
                available: self.available,
            });
        }
        self.available = (self.available - amount).max(0.0);
        let given = self.given_to(batch);
        self.last_request = Some(LabourRequestMemo {
            batch,
            amount: given + amount,
        });
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LabourAttribute {
    Name,
    Sex,
    Age,
    Hired,
    Attribute(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

/// One predicate on a labour member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabourFilter {
    pub attribute: LabourAttribute,
    pub operator: FilterOperator,
    pub value: String,
}

impl LabourFilter {
    pub fn new(attribute: LabourAttribute, operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            attribute,
            operator,
            value: value.into(),
        }
    }

    pub fn matches(&self, member: &LabourMember) -> bool {
        match &self.attribute {
            LabourAttribute::Age => match self.value.trim().parse::<f64>() {
                Ok(value) => compare(self.operator, member.age.partial_cmp(&value)),
                Err(_) => false,
            },
            LabourAttribute::Name => self.compare_text(&member.name),
            LabourAttribute::Sex => {
                let sex = match member.sex {
                    Sex::Male => "Male",
                    Sex::Female => "Female",
                };
                self.compare_text(sex)
            }
            LabourAttribute::Hired => match self.value.trim().to_ascii_lowercase().parse::<bool>() {
                Ok(value) => compare(self.operator, Some(member.hired.cmp(&value))),
                Err(_) => false,
            },
            LabourAttribute::Attribute(key) => match member.attributes.get(key) {
                Some(text) => self.compare_text(text),
                None => self.operator == FilterOperator::NotEqual,
            },
        }
    }

    fn compare_text(&self, text: &str) -> bool {
        // numeric attributes compare as numbers when both sides parse
        let ordering = match (text.trim().parse::<f64>(), self.value.trim().parse::<f64>()) {
            (Ok(a), Ok(b)) => a.partial_cmp(&b),
            _ => Some(text.to_ascii_lowercase().cmp(&self.value.to_ascii_lowercase())),
        };
        compare(self.operator, ordering)
    }
}

fn compare(operator: FilterOperator, ordering: Option<std::cmp::Ordering>) -> bool {
    use std::cmp::Ordering::*;
    let Some(ordering) = ordering else {
        return false;
    };
    match operator {
        FilterOperator::Equal => ordering == Equal,
        FilterOperator::NotEqual => ordering != Equal,
        FilterOperator::LessThan => ordering == Less,
        FilterOperator::LessThanOrEqual => ordering != Greater,
        FilterOperator::GreaterThan => ordering == Greater,
        FilterOperator::GreaterThanOrEqual => ordering != Less,
    }
}

/// Filters selecting eligible members, with an optional fallback group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabourFilterGroup {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub filters: Vec<LabourFilter>,
    #[serde(default)]
    pub fallback: Option<Box<LabourFilterGroup>>,
}

impl LabourFilterGroup {
    /// A group matching every member
    pub fn any() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: LabourFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_fallback(mut self, fallback: LabourFilterGroup) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn matches(&self, member: &LabourMember) -> bool {
        self.filters.iter().all(|f| f.matches(member))
    }

    /// Whether this group or any group in its fallback chain matches `member`
    pub fn admits(&self, member: &LabourMember) -> bool {
        self.matches(member) || self.fallback.as_ref().is_some_and(|f| f.admits(member))
    }
}

/// Per person bounds on a single labour request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabourLimits {
    pub min_per_person: f64,
    pub max_per_person: f64,
}

impl LabourLimits {
    pub fn new(min_per_person: f64, max_per_person: f64) -> Self {
        Self {
            min_per_person: min_per_person.max(0.0),
            max_per_person: max_per_person.max(0.0),
        }
    }
}

/// Labour an activity needs: bounds and the filter groups to draw from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabourRequirement {
    pub name: String,
    #[serde(default)]
    pub min_per_person: f64,
    pub max_per_person: f64,
    /// Request the days from every matching member rather than once per group
    #[serde(default)]
    pub apply_to_all: bool,
    /// A labour shortfall scales the activity through `labour_limit_proportion`
    #[serde(default)]
    pub shortfall_affects_activity: bool,
    #[serde(default)]
    pub filter_groups: Vec<LabourFilterGroup>,
}

impl LabourRequirement {
    pub fn new(name: impl Into<String>, min_per_person: f64, max_per_person: f64) -> Self {
        Self {
            name: name.into(),
            min_per_person,
            max_per_person,
            apply_to_all: false,
            shortfall_affects_activity: false,
            filter_groups: Vec::new(),
        }
    }

    pub fn with_group(mut self, group: LabourFilterGroup) -> Self {
        self.filter_groups.push(group);
        self
    }

    pub fn apply_to_all(mut self) -> Self {
        self.apply_to_all = true;
        self
    }

    pub fn shortfall_affects_activity(mut self) -> Self {
        self.shortfall_affects_activity = true;
        self
    }

    pub fn limits(&self) -> LabourLimits {
        LabourLimits::new(self.min_per_person, self.max_per_person)
    }

    /// Selection criteria for a request drawn through `group`
    pub fn criteria(&self, group: &LabourFilterGroup) -> LabourCriteria {
        LabourCriteria {
            requirement: self.name.clone(),
            group: group.clone(),
            limits: self.limits(),
            shortfall_affects_activity: self.shortfall_affects_activity,
        }
    }
}

/// Selection criteria carried by a labour request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabourCriteria {
    pub requirement: String,
    pub group: LabourFilterGroup,
    pub limits: LabourLimits,
    pub shortfall_affects_activity: bool,
}

impl LabourCriteria {
    /// Any member, no minimum, the given maximum
    pub fn unrestricted(max_per_person: f64) -> Self {
        Self {
            requirement: String::new(),
            group: LabourFilterGroup::any(),
            limits: LabourLimits::new(0.0, max_per_person),
            shortfall_affects_activity: false,
        }
    }
}

/// Result of planning a labour request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabourAllocation {
    /// (member index, days) in the order they were chosen
    pub contributions: Vec<(usize, f64)>,
    pub provided: f64,
    /// Allocation stopped because a member would have given less than the minimum
    pub limited_by_minimum: bool,
}

/// The labour resource group
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabourPool {
    pub name: String,
    members: Vec<LabourMember>,
    /// Ways to obtain extra days (typically hiring) when labour is short
    #[serde(default)]
    pub transmutations: Vec<Transmutation>,
}

impl LabourPool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            transmutations: Vec::new(),
        }
    }

    pub fn add_member(&mut self, member: LabourMember) {
        self.members.push(member);
    }

    pub fn members(&self) -> &[LabourMember] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&LabourMember> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn total_available(&self) -> f64 {
        self.members.iter().map(|m| m.available).sum()
    }

    /// Restore every member's days for a new step and clear request memos
    pub fn refresh_availability(&mut self) {
        for member in &mut self.members {
            member.available = member.capacity;
            member.last_request = None;
        }
    }

    /// Extra days hired members admitted by `criteria` could still give to `batch`
    pub fn hired_headroom(&self, batch: BatchId, criteria: &LabourCriteria) -> f64 {
        self.members
            .iter()
            .filter(|m| m.hired && criteria.group.admits(m))
            .map(|m| m.headroom(batch, criteria.limits.max_per_person))
            .sum()
    }

    /// Spread days bought by a transmutation over hired members
    ///
    /// Members admitted by `criteria` are filled up to what each can still
    /// give to `batch`; anything left over goes to the first hired member.
    /// Returns false if nobody is hired.
    pub fn add_hired_days(&mut self, days: f64, batch: BatchId, criteria: &LabourCriteria) -> bool {
        let Some(first) = self.members.iter().position(|m| m.hired) else {
            return false;
        };
        let mut left = days;
        for member in self
            .members
            .iter_mut()
            .filter(|m| m.hired && criteria.group.admits(m))
        {
            if left <= EPSILON {
                break;
            }
            let share = left.min(member.headroom(batch, criteria.limits.max_per_person));
            member.available += share;
            left -= share;
        }
        if left > EPSILON {
            self.members[first].available += left;
        }
        true
    }

    /// Work out which members would fill `amount_needed` days without changing the pool
    pub fn plan(
        &self,
        batch: BatchId,
        amount_needed: f64,
        criteria: &LabourCriteria,
        allow_partial: bool,
    ) -> LabourAllocation {
        let limits = criteria.limits;
        let mut allocation = LabourAllocation::default();
        let mut remaining: Vec<f64> = self
            .members
            .iter()
            .map(|m| m.available_for(batch, limits.max_per_person))
            .collect();

        let mut current = Some(&criteria.group);
        while let Some(group) = current {
            if amount_needed - allocation.provided <= EPSILON {
                break;
            }

            let eligible: Vec<usize> = (0..self.members.len())
                .filter(|&i| remaining[i] > EPSILON && group.matches(&self.members[i]))
                .collect();

            // whole task members, tightest fit first
            loop {
                let outstanding = amount_needed - allocation.provided;
                if outstanding <= EPSILON {
                    break;
                }
                let candidate = eligible
                    .iter()
                    .copied()
                    .filter(|&i| remaining[i] + EPSILON >= outstanding)
                    .min_by_key(|&i| OrderedFloat(remaining[i]));
                let Some(i) = candidate else {
                    break;
                };
                let amount = outstanding.min(remaining[i]).min(limits.max_per_person);
                if amount < limits.min_per_person {
                    allocation.limited_by_minimum = true;
                    return allocation;
                }
                remaining[i] -= amount;
                allocation.record(i, amount);
            }

            // part task members, biggest providers first
            if allow_partial && amount_needed - allocation.provided > EPSILON {
                let mut ordered = eligible.clone();
                ordered.sort_by_key(|&i| Reverse(OrderedFloat(remaining[i])));
                for i in ordered {
                    let outstanding = amount_needed - allocation.provided;
                    if outstanding <= EPSILON {
                        break;
                    }
                    let amount = outstanding.min(remaining[i]).min(limits.max_per_person);
                    if amount <= EPSILON {
                        continue;
                    }
                    if amount < limits.min_per_person {
                        // members are in descending order so nobody later qualifies
                        allocation.limited_by_minimum = true;
                        break;
                    }
                    remaining[i] -= amount;
                    allocation.record(i, amount);
                }
            }

            current = group.fallback.as_deref();
        }

        allocation
    }

    /// Apply a plan made with `plan` for the same batch
    ///
    /// Returns the value of the labour used (days x pay rate).
    pub fn commit(&mut self, batch: BatchId, allocation: &LabourAllocation) -> Result<f64> {
        let mut value = 0.0;
        for &(index, amount) in &allocation.contributions {
            let member = self.members.get_mut(index).ok_or_else(|| {
                FarmError::InvalidConfiguration(format!("No labour member at index {}", index))
            })?;
            member.take(batch, amount)?;
            value += amount * member.pay_rate;
        }
        Ok(value)
    }
}

impl LabourAllocation {
    fn record(&mut self, index: usize, amount: f64) {
        self.provided += amount;
        match self.contributions.iter_mut().find(|(i, _)| *i == index) {
            Some((_, total)) => *total += amount,
            None => self.contributions.push((index, amount)),
        }
    }
}
