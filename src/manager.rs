use crate::config::StockConfig;
use crate::error::{Result, StockError};
use crate::inventory::{Inventory, Mode, Strategy};
use crate::matcher::{self, Match};
use crate::modifier::{self, Modification};
use crate::money::{Money, Rounding};
use crate::overrides::Overrides;
use crate::realized::{CloseCause, ClosedPosition, OrphanEvent, PositionLines, Settlement};
use crate::splitter;
use crate::transaction::{EventId, EventKind, EventRef, ModificationMode, TradeEvent};
use crate::unrealized::{Lot, OpenPosition, Stock};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// StockManager holds the open lots of one security and everything realized
/// from them.
///
/// add -> dispatch on the event kind ->
///     BUY opens a lot, SELL/RBT close lots, MODIFICATION changes amounts,
///     MODIFICATION_QUANTITY rescales quantities
///
/// Events must be added in chronological order; they are not sorted here.
/// An error aborts the current event only. Validation errors leave the
/// manager untouched, fatal ones (see [`StockError::is_fatal`]) mean its
/// state has to be rebuilt.
#[derive(Debug)]
pub struct StockManager<S = ()> {
    config: StockConfig,
    inventory: Inventory<S>,
    closed: Vec<ClosedPosition<S>>,
    closed_by_buy: HashMap<EventId, Vec<usize>>,
    closed_by_sell: HashMap<EventId, Vec<usize>>,
    orphans: Vec<OrphanEvent<S>>,
    modifications: Vec<Modification<S>>,
    settlements: Vec<Settlement<S>>,
    overrides: Overrides,
}

impl<S: Clone> Default for StockManager<S> {
    fn default() -> Self {
        StockManager::with_config(StockConfig::default())
    }
}

impl<S: Clone> StockManager<S> {
    pub fn new(mode: Mode) -> Self {
        StockManager::with_config(StockConfig::new(mode))
    }

    pub fn with_config(config: StockConfig) -> Self {
        StockManager {
            config,
            inventory: Inventory::new(config.mode),
            closed: Vec::new(),
            closed_by_buy: HashMap::new(),
            closed_by_sell: HashMap::new(),
            orphans: Vec::new(),
            modifications: Vec::new(),
            settlements: Vec::new(),
            overrides: Overrides::default(),
        }
    }

    /// Adds events one by one, stopping at the first error.
    pub fn process<I>(&mut self, events: I) -> Result<()>
    where
        I: IntoIterator<Item = TradeEvent<S>>,
    {
        for event in events {
            self.add(event)?;
        }
        Ok(())
    }

    pub fn add(&mut self, event: TradeEvent<S>) -> Result<()> {
        let (event, kind) = event.into_parts();
        debug!(event = %event.id, %kind, "adding event");
        match kind {
            EventKind::Buy { quantity, amount } => self.buy(event, quantity, amount),
            EventKind::Sell { quantity } => self.sell(event, CloseCause::Sell, quantity),
            EventKind::Reimbursement { quantity } => {
                // nothing given means everything held
                let quantity = quantity.unwrap_or_else(|| self.inventory.quantity());
                self.sell(event, CloseCause::Rbt, quantity)
            }
            EventKind::Modification { delta, mode } => self.modification(event, delta, mode),
            EventKind::QuantityModification {
                before,
                after,
                scale,
            } => splitter::split(&mut self.inventory, before, after, scale),
        }
    }

    fn buy(&mut self, event: EventRef<S>, quantity: Decimal, amount: Money) -> Result<()> {
        self.check_currency(amount)?;
        self.inventory.add(Lot::new(Some(event), quantity, amount));
        Ok(())
    }

    fn sell(&mut self, event: EventRef<S>, cause: CloseCause, quantity: Decimal) -> Result<()> {
        let mut matched = Match::new(event, cause, quantity);
        let result = matcher::consume(
            &mut self.inventory,
            &mut matched,
            &self.overrides,
            &self.config.rounding,
        );
        // evicted lots are recorded even when a later lot failed
        for position in matched.closed {
            self.add_closed_position(position);
        }
        if let Some(orphan) = matched.orphan {
            self.orphans.push(orphan);
        }
        self.settlements.push(matched.settlement);
        result
    }

    fn modification(
        &mut self,
        event: EventRef<S>,
        delta: Money,
        mode: Option<ModificationMode>,
    ) -> Result<()> {
        self.check_currency(delta)?;
        let mode = mode.unwrap_or(self.config.modification_mode);
        let records = modifier::modify(
            &mut self.inventory,
            &event,
            delta,
            mode,
            self.overrides.buy_modification(event.id),
            &self.config.rounding,
        )?;
        self.modifications.extend(records);
        Ok(())
    }

    /// Amounts entering the stock must be in the currency already held.
    fn check_currency(&self, amount: Money) -> Result<()> {
        match self.inventory.stock().amount {
            Some(held) if held.currency() != amount.currency() => Err(StockError::CurrencyMismatch {
                expected: held.currency(),
                found: amount.currency(),
            }),
            _ => Ok(()),
        }
    }

    fn add_closed_position(&mut self, position: ClosedPosition<S>) {
        let index = self.closed.len();
        if let Some(buy) = position.buy_id() {
            self.closed_by_buy.entry(buy).or_default().push(index);
        }
        self.closed_by_sell
            .entry(position.sell_id())
            .or_default()
            .push(index);
        self.closed.push(position);
    }

    /// Forces the amount `sell` takes from the `buy` lot when it only
    /// consumes part of it.
    ///
    /// Returns `Ok(false)` when the override is ignored: the amount is not
    /// positive, or the events are not a buy and a sell or reimbursement.
    pub fn add_buy_sell_money(
        &mut self,
        buy: &TradeEvent<S>,
        sell: &TradeEvent<S>,
        amount: Money,
    ) -> Result<bool> {
        let EventKind::Buy { amount: cost, .. } = buy.kind() else {
            warn!(buy = %buy.id(), "buy/sell override needs a buy event");
            return Ok(false);
        };
        if !matches!(
            sell.kind(),
            EventKind::Sell { .. } | EventKind::Reimbursement { .. }
        ) {
            warn!(sell = %sell.id(), "buy/sell override needs a sell or reimbursement event");
            return Ok(false);
        }
        if cost.currency() != amount.currency() {
            return Err(StockError::CurrencyMismatch {
                expected: cost.currency(),
                found: amount.currency(),
            });
        }
        Ok(self.overrides.add_buy_sell(buy.id(), sell.id(), amount))
    }

    /// Forces the delta one buy lot receives from `modification`.
    ///
    /// Only consulted when several lots are open. Returns `Ok(false)` when
    /// the sign differs from the modification's own delta.
    pub fn add_buy_modification_money(
        &mut self,
        buy: &TradeEvent<S>,
        modification: &TradeEvent<S>,
        amount: Money,
    ) -> Result<bool> {
        if !matches!(buy.kind(), EventKind::Buy { .. }) {
            warn!(buy = %buy.id(), "buy/modification override needs a buy event");
            return Ok(false);
        }
        let Some(delta) = modification.delta() else {
            warn!(modification = %modification.id(), "buy/modification override needs a modification event");
            return Ok(false);
        };
        if delta.currency() != amount.currency() {
            return Err(StockError::CurrencyMismatch {
                expected: delta.currency(),
                found: amount.currency(),
            });
        }
        Ok(self
            .overrides
            .add_buy_modification(buy.id(), modification.id(), delta, amount))
    }

    /// Snapshots of the open lots, head first.
    pub fn opened_positions(&self) -> Vec<OpenPosition<S>> {
        self.inventory.iter().map(Lot::snapshot).collect()
    }

    pub fn closed_positions(&self) -> &[ClosedPosition<S>] {
        &self.closed
    }

    pub fn closed_positions_by_buy(&self, buy: EventId) -> Vec<&ClosedPosition<S>> {
        self.indexed(self.closed_by_buy.get(&buy))
    }

    pub fn closed_positions_by_sell(&self, sell: EventId) -> Vec<&ClosedPosition<S>> {
        self.indexed(self.closed_by_sell.get(&sell))
    }

    fn indexed(&self, indices: Option<&Vec<usize>>) -> Vec<&ClosedPosition<S>> {
        indices
            .map(|indices| indices.iter().filter_map(|&i| self.closed.get(i)).collect())
            .unwrap_or_default()
    }

    pub fn position_lines(&self) -> PositionLines<S> {
        PositionLines {
            opened: self.opened_positions(),
            closed: self.closed.clone(),
        }
    }

    pub fn modifications(&self) -> &[Modification<S>] {
        &self.modifications
    }

    pub fn orphan_events(&self) -> &[OrphanEvent<S>] {
        &self.orphans
    }

    pub fn settlements(&self) -> &[Settlement<S>] {
        &self.settlements
    }

    pub fn settlement(&self, event: EventId) -> Option<&Settlement<S>> {
        self.settlements.iter().find(|s| s.event.id == event)
    }

    pub fn stock(&self) -> Stock {
        self.inventory.stock()
    }

    pub fn quantity(&self) -> Decimal {
        self.inventory.quantity()
    }

    pub fn is_empty(&self) -> bool {
        self.inventory.is_empty()
    }

    pub fn config(&self) -> &StockConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.inventory.mode()
    }

    pub fn modification_mode(&self) -> ModificationMode {
        self.config.modification_mode
    }

    pub fn rounding(&self) -> &Rounding {
        &self.config.rounding
    }
}

impl<S: Clone> fmt::Display for StockManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StockManager {}; {}, lots:{}, closed:{}, orphans:{}",
            self.mode(),
            self.stock(),
            self.inventory.len(),
            self.closed.len(),
            self.orphans.len()
        )
    }
}
