use crate::error::Result;
use crate::inventory::{Inventory, Strategy};
use crate::money::{Money, Rounding};
use crate::overrides::Overrides;
use crate::realized::{CloseCause, ClosedPosition, OrphanEvent, Settlement};
use crate::transaction::EventRef;
use rust_decimal::Decimal;
use tracing::{trace, warn};

/// Everything one sell or reimbursement produced.
///
/// Filled lot by lot, so whatever was consumed before an error is still
/// here.
#[derive(Debug)]
pub struct Match<S> {
    pub closed: Vec<ClosedPosition<S>>,
    pub settlement: Settlement<S>,
    pub orphan: Option<OrphanEvent<S>>,
}

impl<S> Match<S> {
    pub fn new(event: EventRef<S>, cause: CloseCause, demand: Decimal) -> Self {
        Match {
            closed: Vec::new(),
            settlement: Settlement {
                event,
                cause,
                requested: demand.max(Decimal::ZERO),
                matched: Decimal::ZERO,
                amount: None,
                consumed: Vec::new(),
            },
            orphan: None,
        }
    }
}

/// Consumes the requested units from the head of the inventory.
///
/// A fully consumed lot is zeroed and evicted; a partly consumed one gives
/// up a prorated share of its amount, or the forced amount registered for
/// this (sell, buy) pair. Demand left once the inventory runs dry becomes an
/// orphan. Errors are fatal: they mean a lot would have gone negative. The
/// lots consumed before the error stay recorded in `matched`.
pub fn consume<S: Clone>(
    inventory: &mut Inventory<S>,
    matched: &mut Match<S>,
    overrides: &Overrides,
    rounding: &Rounding,
) -> Result<()> {
    let event = matched.settlement.event.clone();
    let cause = matched.settlement.cause;
    let mut remaining = matched.settlement.unmatched();

    while remaining > Decimal::ZERO && !inventory.is_empty() {
        let Some(head) = inventory.peek_mut() else {
            break;
        };
        let lot_quantity = head.quantity;
        let lot_amount = head.amount;
        let buy = head.origin.clone();

        let (quantity, amount) = if lot_quantity <= remaining {
            head.clear();
            inventory.remove();
            (lot_quantity, lot_amount)
        } else {
            let forced = buy
                .as_ref()
                .and_then(|b| overrides.buy_sell(event.id, b.id));
            let amount = match forced {
                Some(amount) => amount,
                None => lot_amount.prorate(remaining, lot_quantity, rounding)?,
            };
            head.take(remaining, amount)?;
            (remaining, amount)
        };
        trace!(sell = %event.id, %quantity, %amount, "lot consumed");

        remaining -= quantity;
        let settlement = &mut matched.settlement;
        settlement.matched += quantity;
        settlement.amount = Some(match settlement.amount {
            Some(total) => total + amount,
            None => amount,
        });
        settlement.consumed.push(buy.clone());
        matched.closed.push(ClosedPosition {
            buy,
            sell: event.clone(),
            quantity,
            amount,
            cause,
        });
    }

    if remaining > Decimal::ZERO {
        warn!(event = %event.id, unmatched = %remaining, ?cause, "not enough stock, recording orphan");
        matched.orphan = Some(OrphanEvent {
            event,
            quantity: remaining,
            cause,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::inventory::Mode;
    use crate::money::Currency;
    use crate::transaction::TradeEvent;
    use crate::unrealized::Lot;
    use rust_decimal_macros::dec;

    fn eur(d: Decimal) -> Money {
        Money::new(d, Currency::EUR)
    }

    fn stocked(mode: Mode, lots: &[(Decimal, Decimal)]) -> (Inventory<usize>, Vec<TradeEvent<usize>>) {
        let mut inventory = Inventory::new(mode);
        let mut buys = Vec::new();
        for (i, (q, a)) in lots.iter().enumerate() {
            let buy = TradeEvent::buy(*q, eur(*a), i);
            inventory.add(Lot::new(Some(buy.to_ref()), *q, eur(*a)));
            buys.push(buy);
        }
        (inventory, buys)
    }

    #[test]
    fn partial_sell_prorates_the_head_lot() {
        let (mut inventory, _) = stocked(Mode::Fifo, &[(dec!(3), dec!(100))]);
        let sell = TradeEvent::sell(dec!(2), 9);
        let mut m = Match::new(sell.to_ref(), CloseCause::Sell, dec!(2));
        consume(&mut inventory, &mut m, &Overrides::default(), &Rounding::default()).unwrap();
        assert_eq!(m.closed.len(), 1);
        assert_eq!(m.closed[0].amount, eur(dec!(66.67)));
        assert_eq!(inventory.peek().unwrap().amount(), eur(dec!(33.33)));
        assert_eq!(inventory.peek().unwrap().quantity(), dec!(1));
        assert_eq!(m.settlement.amount, Some(eur(dec!(66.67))));
        assert!(m.orphan.is_none());
    }

    #[test]
    fn one_sell_spans_several_lots() {
        let (mut inventory, _) =
            stocked(Mode::Fifo, &[(dec!(3), dec!(100)), (dec!(4), dec!(5.17))]);
        let sell = TradeEvent::sell(dec!(4), 9);
        let mut m = Match::new(sell.to_ref(), CloseCause::Sell, dec!(4));
        consume(&mut inventory, &mut m, &Overrides::default(), &Rounding::default()).unwrap();
        let amounts: Vec<_> = m.closed.iter().map(|c| c.amount).collect();
        assert_eq!(amounts, vec![eur(dec!(100)), eur(dec!(1.29))]);
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory.peek().unwrap().amount(), eur(dec!(3.88)));
        assert_eq!(m.settlement.consumed.len(), 2);
        assert_eq!(m.settlement.amount, Some(eur(dec!(101.29))));
    }

    #[test]
    fn forced_amount_replaces_the_prorated_one() {
        let (mut inventory, buys) = stocked(Mode::Fifo, &[(dec!(3), dec!(100))]);
        let sell = TradeEvent::sell(dec!(1), 9);
        let mut overrides = Overrides::default();
        overrides.add_buy_sell(buys[0].id(), sell.id(), eur(dec!(33.34)));
        let mut m = Match::new(sell.to_ref(), CloseCause::Sell, dec!(1));
        consume(&mut inventory, &mut m, &overrides, &Rounding::default()).unwrap();
        assert_eq!(m.closed[0].amount, eur(dec!(33.34)));
        assert_eq!(inventory.peek().unwrap().amount(), eur(dec!(66.66)));
    }

    #[test]
    fn forced_amount_larger_than_the_lot_is_fatal() {
        let (mut inventory, buys) = stocked(Mode::Fifo, &[(dec!(3), dec!(10))]);
        let sell = TradeEvent::sell(dec!(1), 9);
        let mut overrides = Overrides::default();
        overrides.add_buy_sell(buys[0].id(), sell.id(), eur(dec!(11)));
        let mut m = Match::new(sell.to_ref(), CloseCause::Sell, dec!(1));
        let err = consume(&mut inventory, &mut m, &overrides, &Rounding::default()).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(inventory.peek().unwrap().amount(), eur(dec!(10)));
        assert!(m.closed.is_empty());
    }

    #[test]
    fn lots_consumed_before_a_fatal_error_stay_recorded() {
        let (mut inventory, buys) =
            stocked(Mode::Fifo, &[(dec!(1), dec!(10)), (dec!(3), dec!(10))]);
        let sell = TradeEvent::sell(dec!(2), 9);
        let mut overrides = Overrides::default();
        overrides.add_buy_sell(buys[1].id(), sell.id(), eur(dec!(11)));
        let mut m = Match::new(sell.to_ref(), CloseCause::Sell, dec!(2));
        let err = consume(&mut inventory, &mut m, &overrides, &Rounding::default()).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(m.closed.len(), 1);
        assert_eq!(m.closed[0].buy_id(), Some(buys[0].id()));
        assert_eq!(m.closed[0].amount, eur(dec!(10)));
        assert_eq!(m.settlement.matched, dec!(1));
        assert_eq!(m.settlement.amount, Some(eur(dec!(10))));
        assert!(m.orphan.is_none());
        assert_eq!(inventory.quantity() + m.settlement.matched, dec!(4));
    }

    #[test]
    fn excess_demand_becomes_orphan() {
        let (mut inventory, _) = stocked(Mode::Lifo, &[(dec!(3), dec!(100))]);
        let sell = TradeEvent::sell(dec!(4), 9);
        let mut m = Match::new(sell.to_ref(), CloseCause::Sell, dec!(4));
        consume(&mut inventory, &mut m, &Overrides::default(), &Rounding::default()).unwrap();
        assert!(inventory.is_empty());
        assert_eq!(m.orphan.unwrap().quantity, dec!(1));
        assert_eq!(m.settlement.matched, dec!(3));
    }

    #[test]
    fn zero_demand_is_a_no_op() {
        let (mut inventory, _) = stocked(Mode::Fifo, &[(dec!(3), dec!(100))]);
        let rbt = TradeEvent::reimbursement(dec!(0), 9);
        let mut m = Match::new(rbt.to_ref(), CloseCause::Rbt, dec!(0));
        consume(&mut inventory, &mut m, &Overrides::default(), &Rounding::default()).unwrap();
        assert!(m.closed.is_empty());
        assert!(m.orphan.is_none());
        assert_eq!(m.settlement.amount, None);
        assert_eq!(inventory.quantity(), dec!(3));
    }
}
