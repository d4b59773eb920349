use crate::error::{Result, StockError};
use crate::money::Money;
use crate::transaction::EventRef;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// A live open buy record held by an inventory strategy.
///
/// Quantity and amount are never negative once an operation completes.
/// `origin` is `None` for the weighted-average aggregate, which merges many
/// buys into one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Lot<S> {
    pub(crate) origin: Option<EventRef<S>>,
    pub(crate) quantity: Decimal,
    pub(crate) amount: Money,
}

impl<S> Lot<S> {
    pub fn new(origin: Option<EventRef<S>>, quantity: Decimal, amount: Money) -> Self {
        Lot {
            origin,
            quantity,
            amount,
        }
    }

    pub fn origin(&self) -> Option<&EventRef<S>> {
        self.origin.as_ref()
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    /// Removes `quantity` units carrying `amount` from the lot.
    ///
    /// Fails if either remainder would be negative; the lot is unchanged then.
    pub(crate) fn take(&mut self, quantity: Decimal, amount: Money) -> Result<()> {
        let rest_amount = self.amount - amount;
        if rest_amount.is_negative() {
            return Err(StockError::NegativeLot {
                amount: rest_amount,
            });
        }
        let rest_quantity = self.quantity - quantity;
        if rest_quantity < Decimal::ZERO {
            return Err(StockError::NegativeQuantity {
                quantity: rest_quantity,
            });
        }
        self.amount = rest_amount;
        self.quantity = rest_quantity;
        Ok(())
    }

    /// Full consumption: both fields are assigned zero, not subtracted.
    pub(crate) fn clear(&mut self) {
        self.quantity = Decimal::ZERO;
        self.amount = Money::zero(self.amount.currency());
    }
}

impl<S: Clone> Lot<S> {
    pub fn snapshot(&self) -> OpenPosition<S> {
        OpenPosition {
            buy: self.origin.clone(),
            quantity: self.quantity,
            amount: self.amount,
        }
    }
}

/// Read only snapshot of a still open lot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenPosition<S> {
    pub buy: Option<EventRef<S>>,
    pub quantity: Decimal,
    pub amount: Money,
}

impl<S> OpenPosition<S> {
    pub fn source(&self) -> Option<&S> {
        self.buy.as_ref().and_then(|b| b.source.as_ref())
    }
}

impl<S> fmt::Display for OpenPosition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.buy {
            Some(buy) => write!(f, "OpenPosition: buy {}, ", buy.id)?,
            None => write!(f, "OpenPosition: aggregate, ")?,
        }
        write!(f, "quantity: {}, amount: {}", self.quantity, self.amount)
    }
}

/// Aggregate of everything still held. `amount` is `None` when nothing is held.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stock {
    pub quantity: Decimal,
    pub amount: Option<Money>,
}

impl Stock {
    pub fn empty() -> Self {
        Stock {
            quantity: Decimal::ZERO,
            amount: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
    }
}

impl fmt::Display for Stock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.amount {
            Some(amount) => write!(f, "Stock: quantity: {}, amount: {}", self.quantity, amount),
            None => write!(f, "Stock: empty"),
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::money::Currency;
    use rust_decimal_macros::dec;

    fn eur(d: Decimal) -> Money {
        Money::new(d, Currency::EUR)
    }

    #[test]
    fn take_part_of_a_lot() {
        let mut lot: Lot<()> = Lot::new(None, dec!(3), eur(dec!(100)));
        lot.take(dec!(2), eur(dec!(66.67))).unwrap();
        assert_eq!(lot.quantity(), dec!(1));
        assert_eq!(lot.amount(), eur(dec!(33.33)));
    }

    #[test]
    fn take_more_money_than_held_leaves_lot_untouched() {
        let mut lot: Lot<()> = Lot::new(None, dec!(3), eur(dec!(10)));
        let err = lot.take(dec!(1), eur(dec!(11))).unwrap_err();
        assert_eq!(err, StockError::NegativeLot { amount: eur(dec!(-1)) });
        assert_eq!(lot.amount(), eur(dec!(10)));
        assert_eq!(lot.quantity(), dec!(3));
    }

    #[test]
    fn clear_assigns_zero() {
        let mut lot: Lot<()> = Lot::new(None, dec!(4.666667), eur(dec!(33.33)));
        lot.clear();
        assert_eq!(lot.quantity(), Decimal::ZERO);
        assert!(lot.amount().is_zero());
        assert_eq!(lot.amount().currency(), Currency::EUR);
    }

    #[test]
    fn snapshot_of_aggregate_has_no_source() {
        let lot: Lot<&str> = Lot::new(None, dec!(3), eur(dec!(30)));
        let open = lot.snapshot();
        assert_eq!(open.source(), None);
        assert_eq!(open.to_string(), "OpenPosition: aggregate, quantity: 3, amount: 30 EUR");
    }

    #[test]
    fn empty_stock_has_no_amount() {
        assert!(Stock::empty().is_empty());
        assert_eq!(Stock::empty().quantity, Decimal::ZERO);
    }
}
