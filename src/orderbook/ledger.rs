//! Per-order book state aggregated into a price ladder

use std::collections::HashMap;
use std::hash::Hash;

use rust_decimal::Decimal;

use super::{PriceLadder, Side};

#[derive(Debug, Clone)]
struct RestingOrder {
    side: Side,
    price: Decimal,
    size: Decimal,
}

/// Resting orders keyed by exchange order id, with the aggregated ladder
/// kept in step on every change.
#[derive(Debug, Clone)]
pub struct OrderLedger<K> {
    orders: HashMap<K, RestingOrder>,
    ladder: PriceLadder,
}

impl<K: Eq + Hash> Default for OrderLedger<K> {
    fn default() -> Self {
        Self {
            orders: HashMap::new(),
            ladder: PriceLadder::new(),
        }
    }
}

impl<K: Eq + Hash> OrderLedger<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.orders.clear();
        self.ladder.clear();
    }

    /// Insert an order, replacing any order with the same id
    pub fn insert(&mut self, id: K, side: Side, price: Decimal, size: Decimal) {
        if size <= Decimal::ZERO {
            self.remove(&id);
            return;
        }
        if let Some(previous) = self.orders.insert(id, RestingOrder { side, price, size }) {
            self.ladder.adjust(previous.side, previous.price, -previous.size);
        }
        self.ladder.adjust(side, price, size);
    }

    /// Remove an order. Returns false for unknown ids.
    pub fn remove(&mut self, id: &K) -> bool {
        match self.orders.remove(id) {
            Some(order) => {
                self.ladder.adjust(order.side, order.price, -order.size);
                true
            }
            None => false,
        }
    }

    /// Set a new remaining size. Returns false for unknown ids.
    pub fn resize(&mut self, id: &K, new_size: Decimal) -> bool {
        let Some(order) = self.orders.get_mut(id) else {
            return false;
        };

        let (side, price, delta) = (order.side, order.price, new_size - order.size);
        order.size = new_size;
        self.ladder.adjust(side, price, delta);

        if new_size <= Decimal::ZERO {
            self.orders.remove(id);
        }
        true
    }

    /// Reduce an order by a filled quantity. Returns false for unknown ids.
    pub fn fill(&mut self, id: &K, quantity: Decimal) -> bool {
        match self.orders.get(id).map(|order| order.size) {
            Some(size) => self.resize(id, size - quantity),
            None => false,
        }
    }

    pub fn contains(&self, id: &K) -> bool {
        self.orders.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn ladder(&self) -> &PriceLadder {
        &self.ladder
    }
}
