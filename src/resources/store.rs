//! Scalar resource store - a fungible quantity of one resource type

use serde::{Deserialize, Serialize};

use crate::core::error::{FarmError, Result};
use crate::resources::transmutation::Transmutation;

/// Amounts below this are treated as zero when checking an overdraw
const OVERDRAW_TOLERANCE: f64 = 1e-9;

/// A fungible store of one resource type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceStore {
    pub name: String,
    amount: f64,
    /// Transmutations that can top this store up when it is short
    #[serde(default)]
    pub transmutations: Vec<Transmutation>,
}

impl ResourceStore {
    pub fn new(name: impl Into<String>, amount: f64) -> Self {
        Self {
            name: name.into(),
            amount: amount.max(0.0),
            transmutations: Vec::new(),
        }
    }

    pub fn with_transmutation(mut self, transmutation: Transmutation) -> Self {
        self.transmutations.push(transmutation);
        self
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Add to the store; a negative gain is a contract violation
    pub fn add(&mut self, amount: f64, source: &str, note: &str) -> Result<()> {
        self.reject_negative(amount)?;
        if amount == 0.0 {
            return Ok(());
        }
        self.amount += amount;
        tracing::trace!(
            store = %self.name,
            amount,
            source,
            note,
            "resource gain"
        );
        Ok(())
    }

    /// Remove an exact amount from the store
    ///
    /// Removing more than is held is a contract violation and fails
    /// without changing the store.
    pub fn remove(&mut self, amount: f64, activity: &str, note: &str) -> Result<f64> {
        self.reject_negative(amount)?;
        if amount == 0.0 {
            return Ok(0.0);
        }
        if amount > self.amount + OVERDRAW_TOLERANCE {
            return Err(FarmError::Overdraw {
                pool: self.name.clone(),
                requested: amount,
                held: self.amount,
            });
        }
        self.amount = (self.amount - amount).max(0.0);
        tracing::trace!(
            store = %self.name,
            amount,
            activity,
            note,
            "resource loss"
        );
        Ok(amount)
    }

    fn reject_negative(&self, amount: f64) -> Result<()> {
        if amount < 0.0 {
            return Err(FarmError::NegativeAmount {
                pool: self.name.clone(),
                amount,
            });
        }
        Ok(())
    }
}
