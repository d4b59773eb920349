use crate::error::{Result, StockError};
use crate::inventory::{Inventory, Strategy};
use crate::money::{Money, Rounding};
use crate::transaction::{EventId, EventRef, ModificationMode};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace};

/// One lot's amount change caused by one modification event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Modification<S> {
    pub buy: Option<EventRef<S>>,
    pub modification: EventRef<S>,
    /// quantity of the lot when the change was applied
    pub quantity: Decimal,
    pub amount_before: Money,
    pub amount_after: Money,
}

impl<S> Modification<S> {
    pub fn delta(&self) -> Money {
        self.amount_after - self.amount_before
    }
}

impl<S> fmt::Display for Modification<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Modification: {}, ", self.modification.id)?;
        match &self.buy {
            Some(buy) => write!(f, "buy {}, ", buy.id)?,
            None => write!(f, "aggregate, ")?,
        }
        write!(
            f,
            "quantity: {}, amount: {} -> {}",
            self.quantity, self.amount_before, self.amount_after
        )
    }
}

/// Working copy of a lot while a redistribution is planned.
#[derive(Debug, Clone, Copy)]
struct Slot {
    index: usize,
    buy: Option<EventId>,
    quantity: Decimal,
    amount: Money,
}

/// Proportional base of a traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Share {
    Quantity,
    Amount,
}

impl Share {
    fn of(self, slot: &Slot) -> Decimal {
        match self {
            Share::Quantity => slot.quantity,
            Share::Amount => slot.amount.amount(),
        }
    }
}

/// Planned amount change for the lot at `index`.
type Plan = Vec<(usize, Money)>;

/// Spreads `delta` over the open lots and returns one record per changed lot.
///
/// The change is planned on a copy first and committed only when the whole
/// plan holds, so a rejected modification leaves every lot untouched.
pub fn modify<S: Clone>(
    inventory: &mut Inventory<S>,
    event: &EventRef<S>,
    delta: Money,
    mode: ModificationMode,
    forced: Option<&HashMap<EventId, Money>>,
    rounding: &Rounding,
) -> Result<Vec<Modification<S>>> {
    if delta.is_zero() {
        return Ok(Vec::new());
    }
    if inventory.is_empty() {
        return Err(StockError::EmptyPositionModification);
    }
    if delta.is_negative() {
        if let Some(stock_amount) = inventory.stock().amount {
            if (stock_amount + delta).is_negative() {
                return Err(StockError::StockAmountReduction {
                    stock_amount,
                    modification_amount: delta,
                });
            }
        }
    }

    let slots: Vec<Slot> = inventory
        .iter()
        .enumerate()
        .map(|(index, lot)| Slot {
            index,
            buy: lot.origin.as_ref().map(|o| o.id),
            quantity: lot.quantity,
            amount: lot.amount,
        })
        .collect();

    let plan = if slots.len() == 1 {
        vec![(0, delta)]
    } else {
        plan_many(&slots, delta, mode, forced, rounding)?
    };
    commit(inventory, event, plan)
}

fn plan_many(
    slots: &[Slot],
    delta: Money,
    mode: ModificationMode,
    forced: Option<&HashMap<EventId, Money>>,
    rounding: &Rounding,
) -> Result<Plan> {
    let mut plan = Plan::new();
    let mut remaining = delta;
    let mut candidates: Vec<Slot> = slots.to_vec();

    if let Some(forced) = forced {
        candidates = apply_forced(slots, forced, delta, &mut remaining, &mut plan)?;
        if candidates.is_empty() {
            return Ok(plan);
        }
    }

    let sign = remaining.signum();
    debug!(?mode, %remaining, lots = candidates.len(), "redistributing modification");
    let generic = match (mode, sign) {
        (_, 0) => Plan::new(),
        (ModificationMode::Money, 1) => by_amount(&candidates, remaining, rounding)?,
        (_, 1) => by_quantity(&candidates, remaining, false, rounding)?,
        (ModificationMode::Mixed | ModificationMode::Money, _) => {
            by_amount(&candidates, remaining, rounding)?
        }
        (ModificationMode::Quantity, _) => by_quantity(&candidates, remaining, true, rounding)?,
        (ModificationMode::QuantityFirst, _) => {
            match by_quantity(&candidates, remaining, false, rounding) {
                Err(StockError::StockAmountReduction { .. }) => {
                    debug!("quantity share drives a lot negative, falling back to amount share");
                    by_amount(&candidates, remaining, rounding)?
                }
                other => other?,
            }
        }
    };
    plan.extend(generic);
    Ok(plan)
}

/// Applies the forced per-lot deltas and returns the lots left for the
/// generic redistribution.
fn apply_forced(
    slots: &[Slot],
    forced: &HashMap<EventId, Money>,
    delta: Money,
    remaining: &mut Money,
    plan: &mut Plan,
) -> Result<Vec<Slot>> {
    let forced_total = forced
        .values()
        .fold(Money::zero(delta.currency()), |acc, m| acc + m.abs());
    if forced_total.amount() > delta.abs().amount() {
        return Err(StockError::InvalidForcedTotal {
            modification_amount: delta,
            forced_total,
        });
    }
    let mut rest = Vec::with_capacity(slots.len());
    for slot in slots {
        match slot.buy.and_then(|id| forced.get(&id)) {
            Some(&amount) => {
                if (slot.amount + amount).is_negative() {
                    return Err(StockError::StockAmountReduction {
                        stock_amount: slot.amount,
                        modification_amount: amount,
                    });
                }
                trace!(lot = slot.index, %amount, "forced modification");
                *remaining -= amount;
                plan.push((slot.index, amount));
            }
            None => rest.push(*slot),
        }
    }
    Ok(rest)
}

/// Share proportional to quantity.
///
/// With `clamp`, a lot whose share would exceed its amount is zeroed
/// instead, and what it could not absorb goes back to the other lots.
fn by_quantity(slots: &[Slot], delta: Money, clamp: bool, rounding: &Rounding) -> Result<Plan> {
    let mut plan = Plan::new();
    let mut delta = delta;
    let mut candidates = slots.to_vec();

    if clamp && delta.is_negative() {
        ensure_covered(slots, delta)?;
        loop {
            let base: Decimal = candidates.iter().map(|s| s.quantity).sum();
            // amount + delta * quantity / base < 0, without dividing
            let (clamped, kept): (Vec<Slot>, Vec<Slot>) = candidates.iter().copied().partition(|s| {
                s.amount.amount() * base + delta.amount() * s.quantity < Decimal::ZERO
            });
            if clamped.is_empty() {
                break;
            }
            for slot in clamped {
                trace!(lot = slot.index, amount = %slot.amount, "clamping lot to zero");
                delta += slot.amount;
                plan.push((slot.index, -slot.amount));
            }
            candidates = kept;
        }
    }

    plan.extend(traverse(&candidates, delta, Share::Quantity, rounding)?);
    Ok(plan)
}

/// Share proportional to amount.
fn by_amount(slots: &[Slot], delta: Money, rounding: &Rounding) -> Result<Plan> {
    ensure_covered(slots, delta)?;
    traverse(slots, delta, Share::Amount, rounding)
}

/// The lots together must be able to absorb `delta`.
fn ensure_covered(slots: &[Slot], delta: Money) -> Result<()> {
    let stock_amount = slots
        .iter()
        .fold(Money::zero(delta.currency()), |acc, s| acc + s.amount);
    if (stock_amount + delta).is_negative() {
        return Err(StockError::StockAmountReduction {
            stock_amount,
            modification_amount: delta,
        });
    }
    Ok(())
}

/// Walks the lots in order giving each its rounded share of what is left.
///
/// The lot whose base equals the whole remaining base, the last one at the
/// latest, takes the leftover so the shares add up to `delta` exactly.
fn traverse(slots: &[Slot], delta: Money, share: Share, rounding: &Rounding) -> Result<Plan> {
    if slots.is_empty() {
        return Err(StockError::EmptyPositionModification);
    }
    let mut plan = Plan::with_capacity(slots.len());
    let mut remaining = delta;
    let mut base: Decimal = slots.iter().map(|s| share.of(s)).sum();

    for slot in slots {
        let part = share.of(slot);
        let absorbs = part == base;
        let value = if absorbs {
            remaining
        } else {
            remaining.prorate(part, base, rounding)?
        };
        if (slot.amount + value).is_negative() {
            return Err(StockError::StockAmountReduction {
                stock_amount: slot.amount,
                modification_amount: value,
            });
        }
        plan.push((slot.index, value));
        if absorbs {
            return Ok(plan);
        }
        remaining -= value;
        base -= part;
    }
    Ok(plan)
}

fn commit<S: Clone>(
    inventory: &mut Inventory<S>,
    event: &EventRef<S>,
    plan: Plan,
) -> Result<Vec<Modification<S>>> {
    let lots = inventory.lots_mut();
    let len = lots.len();
    let mut changes = Vec::with_capacity(plan.len());
    for (index, value) in plan {
        let lot = lots
            .get(index)
            .ok_or(StockError::MissingLot { index, len })?;
        let after = lot.amount + value;
        if after.is_negative() {
            return Err(StockError::NegativeLot { amount: after });
        }
        changes.push((index, lot.amount, after));
    }

    let mut records = Vec::with_capacity(changes.len());
    for (index, before, after) in changes {
        let lot = lots
            .get_mut(index)
            .ok_or(StockError::MissingLot { index, len })?;
        lot.amount = after;
        trace!(lot = index, %before, %after, "lot modified");
        records.push(Modification {
            buy: lot.origin.clone(),
            modification: event.clone(),
            quantity: lot.quantity,
            amount_before: before,
            amount_after: after,
        });
    }
    Ok(records)
}
