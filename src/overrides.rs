use crate::money::Money;
use crate::transaction::EventId;
use std::collections::HashMap;
use tracing::warn;

/// Forced allocations registered ahead of processing, keyed by event identity.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    buy_sell: HashMap<(EventId, EventId), Money>,
    buy_modification: HashMap<EventId, HashMap<EventId, Money>>,
}

impl Overrides {
    /// Exact amount a sell takes from one buy lot when it consumes part of it.
    ///
    /// Only positive amounts are kept.
    pub fn add_buy_sell(&mut self, buy: EventId, sell: EventId, amount: Money) -> bool {
        if !amount.is_positive() {
            warn!(%buy, %sell, %amount, "ignoring non positive buy/sell override");
            return false;
        }
        self.buy_sell.insert((sell, buy), amount);
        true
    }

    /// Forced delta of one buy lot for one modification.
    ///
    /// Only kept when it has the same sign as the modification's own delta.
    pub fn add_buy_modification(
        &mut self,
        buy: EventId,
        modification: EventId,
        modification_delta: Money,
        amount: Money,
    ) -> bool {
        if amount.signum() * modification_delta.signum() <= 0 {
            warn!(%buy, %modification, %amount, %modification_delta, "ignoring buy/modification override of the wrong sign");
            return false;
        }
        self.buy_modification
            .entry(modification)
            .or_default()
            .insert(buy, amount);
        true
    }

    pub fn buy_sell(&self, sell: EventId, buy: EventId) -> Option<Money> {
        self.buy_sell.get(&(sell, buy)).copied()
    }

    pub fn buy_modification(&self, modification: EventId) -> Option<&HashMap<EventId, Money>> {
        self.buy_modification.get(&modification)
    }

    pub fn is_empty(&self) -> bool {
        self.buy_sell.is_empty() && self.buy_modification.is_empty()
    }
}
