//! Transmutation definitions
//!
//! A transmutation is attached to a resource type (A) and converts other
//! resources (B) into A when A is short. It produces A in packets of
//! `packet_size`; every child transmute must be able to pay its share of B
//! or the whole transmutation is abandoned.

use serde::{Deserialize, Serialize};

use crate::core::error::{FarmError, Result};
use crate::resources::name::ResourceKind;
use crate::resources::pricing::ResourcePricing;

fn default_category() -> String {
    "Transmutation".into()
}

/// How a transmute prices its source resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmuteStyle {
    /// Fixed amount of B per packet of A
    Direct { amount_per_packet: f64 },
    /// B is paid at the purchase price of A
    UsePricing,
}

/// One source resource (B) consumed by a transmutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transmute {
    pub name: String,
    pub source_kind: ResourceKind,
    /// `"Group.Type"` or `"Type"` name of B
    pub source: String,
    /// B lives in the shared market rather than the farm
    #[serde(default)]
    pub in_market: bool,
    pub style: TransmuteStyle,
}

impl Transmute {
    pub fn direct(
        name: impl Into<String>,
        source_kind: ResourceKind,
        source: impl Into<String>,
        amount_per_packet: f64,
    ) -> Self {
        Self {
            name: name.into(),
            source_kind,
            source: source.into(),
            in_market: false,
            style: TransmuteStyle::Direct { amount_per_packet },
        }
    }

    pub fn priced(name: impl Into<String>, source_kind: ResourceKind, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_kind,
            source: source.into(),
            in_market: false,
            style: TransmuteStyle::UsePricing,
        }
    }

    pub fn from_market(mut self) -> Self {
        self.in_market = true;
        self
    }

    /// Packets of the parent transmutation this transmute needs to cover `shortfall`
    ///
    /// Priced transmutes buy in whole price packets when the price says so,
    /// which can need more than the bare shortfall.
    pub fn shortfall_packets(
        &self,
        shortfall: f64,
        packet_size: f64,
        pricing: Option<&ResourcePricing>,
    ) -> f64 {
        if packet_size <= 0.0 {
            return 0.0;
        }
        match (&self.style, pricing) {
            (TransmuteStyle::UsePricing, Some(price)) if price.use_whole_packets => {
                price.packets_for(shortfall) * price.packet_size / packet_size
            }
            _ => shortfall / packet_size,
        }
    }

    /// Amount of B consumed to produce `packets` packets of `packet_size`
    ///
    /// None when a priced transmute has no price to work with.
    pub fn source_amount(
        &self,
        packets: f64,
        packet_size: f64,
        pricing: Option<&ResourcePricing>,
    ) -> Option<f64> {
        match &self.style {
            TransmuteStyle::Direct { amount_per_packet } => Some(packets * amount_per_packet),
            TransmuteStyle::UsePricing => pricing.map(|price| price.cost_of(packets * packet_size)),
        }
    }
}

/// A rule converting other resources into the resource it is attached to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transmutation {
    pub name: String,
    /// Amount of A produced per packet
    pub packet_size: f64,
    #[serde(default)]
    pub whole_packets_only: bool,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub transmutes: Vec<Transmute>,
}

impl Transmutation {
    pub fn new(name: impl Into<String>, packet_size: f64) -> Self {
        Self {
            name: name.into(),
            packet_size,
            whole_packets_only: false,
            category: default_category(),
            transmutes: Vec::new(),
        }
    }

    pub fn whole_packets(mut self) -> Self {
        self.whole_packets_only = true;
        self
    }

    pub fn with_transmute(mut self, transmute: Transmute) -> Self {
        self.transmutes.push(transmute);
        self
    }

    /// Packets needed to cover `shortfall`: the largest need among the children
    pub fn packets_needed(&self, shortfall: f64, pricing: Option<&ResourcePricing>) -> f64 {
        let packets = self
            .transmutes
            .iter()
            .map(|t| t.shortfall_packets(shortfall, self.packet_size, pricing))
            .fold(0.0_f64, f64::max);
        if self.whole_packets_only {
            packets.floor()
        } else {
            packets
        }
    }

    pub fn validate(&self, resource: &str) -> Result<()> {
        if self.packet_size <= 0.0 {
            return Err(FarmError::InvalidConfiguration(format!(
                "Transmutation [{}] for [r={}] needs a positive packet size",
                self.name, resource
            )));
        }
        if self.transmutes.is_empty() {
            return Err(FarmError::InvalidConfiguration(format!(
                "No transmute components provided under transmutation [{}] for [r={}]",
                self.name, resource
            )));
        }
        Ok(())
    }
}
