//! Pricing collaborator consulted by price-based transmutes

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PurchaseOrSale {
    Purchase,
    Sale,
}

/// Price of a resource, quoted per packet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourcePricing {
    pub packet_size: f64,
    pub price_per_packet: f64,
    #[serde(default)]
    pub use_whole_packets: bool,
}

impl ResourcePricing {
    /// Number of packets needed to cover `amount` (rounded up to whole packets if required)
    pub fn packets_for(&self, amount: f64) -> f64 {
        if self.packet_size <= 0.0 {
            return 0.0;
        }
        let packets = amount / self.packet_size;
        if self.use_whole_packets {
            packets.ceil()
        } else {
            packets
        }
    }

    /// Cost of buying `amount` of the priced resource
    pub fn cost_of(&self, amount: f64) -> f64 {
        self.packets_for(amount) * self.price_per_packet
    }
}

/// Source of resource prices
pub trait PriceLookup {
    /// Price of the resource with the given full name (`"Group.Type"`)
    fn price(&self, resource: &str, style: PurchaseOrSale) -> Option<ResourcePricing>;
}

/// A fixed table of prices keyed by full resource name
#[derive(Debug, Clone, Default)]
pub struct PriceList {
    prices: AHashMap<(String, PurchaseOrSale), ResourcePricing>,
}

impl PriceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, resource: impl Into<String>, style: PurchaseOrSale, pricing: ResourcePricing) {
        self.prices.insert((resource.into(), style), pricing);
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl PriceLookup for PriceList {
    fn price(&self, resource: &str, style: PurchaseOrSale) -> Option<ResourcePricing> {
        self.prices.get(&(resource.to_string(), style)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_packet_cost_rounds_up() {
        let pricing = ResourcePricing {
            packet_size: 10.0,
            price_per_packet: 3.0,
            use_whole_packets: true,
        };
        // 25 units needs 3 whole packets
        assert!((pricing.cost_of(25.0) - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_fractional_packet_cost() {
        let pricing = ResourcePricing {
            packet_size: 10.0,
            price_per_packet: 3.0,
            use_whole_packets: false,
        };
        assert!((pricing.cost_of(25.0) - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_price_list_lookup() {
        let mut prices = PriceList::new();
        let pricing = ResourcePricing {
            packet_size: 1.0,
            price_per_packet: 2.0,
            use_whole_packets: false,
        };
        prices.set("AnimalFoodStore.Lucerne", PurchaseOrSale::Purchase, pricing);
        assert_eq!(
            prices.price("AnimalFoodStore.Lucerne", PurchaseOrSale::Purchase),
            Some(pricing)
        );
        assert!(prices.price("AnimalFoodStore.Lucerne", PurchaseOrSale::Sale).is_none());
        assert_eq!(prices.len(), 1);
    }
}
