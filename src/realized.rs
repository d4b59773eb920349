use crate::money::Money;
use crate::transaction::{EventId, EventRef};
use crate::unrealized::OpenPosition;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a lot was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseCause {
    Sell,
    /// reimbursement
    Rbt,
}

/// Holds a realized match of one buy lot against one sell or reimbursement.
///
/// `buy` is `None` when the lot was the weighted-average aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedPosition<S> {
    pub buy: Option<EventRef<S>>,
    pub sell: EventRef<S>,
    pub quantity: Decimal,
    pub amount: Money,
    pub cause: CloseCause,
}

impl<S> ClosedPosition<S> {
    pub fn buy_id(&self) -> Option<EventId> {
        self.buy.as_ref().map(|b| b.id)
    }

    pub fn sell_id(&self) -> EventId {
        self.sell.id
    }

    pub fn buy_source(&self) -> Option<&S> {
        self.buy.as_ref().and_then(|b| b.source.as_ref())
    }

    pub fn sell_source(&self) -> Option<&S> {
        self.sell.source.as_ref()
    }
}

impl<S> fmt::Display for ClosedPosition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClosedPosition: {:?} {}, ", self.cause, self.sell.id)?;
        match &self.buy {
            Some(buy) => write!(f, "buy {}, ", buy.id)?,
            None => write!(f, "aggregate, ")?,
        }
        write!(f, "quantity: {}, amount: {}", self.quantity, self.amount)
    }
}

/// A sell or reimbursement that found no inventory left for `quantity` units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrphanEvent<S> {
    pub event: EventRef<S>,
    pub quantity: Decimal,
    pub cause: CloseCause,
}

impl<S> fmt::Display for OrphanEvent<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OrphanEvent: {:?} {}, unmatched quantity: {}",
            self.cause, self.event.id, self.quantity
        )
    }
}

/// Outcome of one sell or reimbursement: how much was asked, how much was
/// matched, the accumulated amount and the lots it consumed, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settlement<S> {
    pub event: EventRef<S>,
    pub cause: CloseCause,
    pub requested: Decimal,
    pub matched: Decimal,
    /// `None` when nothing was matched.
    pub amount: Option<Money>,
    pub consumed: Vec<Option<EventRef<S>>>,
}

impl<S> Settlement<S> {
    pub fn unmatched(&self) -> Decimal {
        self.requested - self.matched
    }

    pub fn is_complete(&self) -> bool {
        self.matched == self.requested
    }
}

impl<S> fmt::Display for Settlement<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settlement: {:?} {}, quantity: {}/{}, lots: {}",
            self.cause,
            self.event.id,
            self.matched,
            self.requested,
            self.consumed.len()
        )?;
        if let Some(amount) = self.amount {
            write!(f, ", amount: {}", amount)?;
        }
        Ok(())
    }
}

/// Open and closed positions taken at the same moment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionLines<S> {
    pub opened: Vec<OpenPosition<S>>,
    pub closed: Vec<ClosedPosition<S>>,
}

/// Sum of the closed amounts, `None` for an empty slice.
pub fn total_amount<S>(closed: &[ClosedPosition<S>]) -> Option<Money> {
    let mut positions = closed.iter();
    let first = positions.next()?.amount;
    Some(positions.fold(first, |acc, p| acc + p.amount))
}

pub fn total_quantity<S>(closed: &[ClosedPosition<S>]) -> Decimal {
    closed.iter().map(|p| p.quantity).sum()
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::money::Currency;
    use crate::transaction::TradeEvent;
    use rust_decimal_macros::dec;

    fn closed(quantity: Decimal, amount: Decimal) -> ClosedPosition<&'static str> {
        let buy = TradeEvent::buy(quantity, Money::new(amount, Currency::EUR), "buy");
        let sell = TradeEvent::sell(quantity, "sell");
        ClosedPosition {
            buy: Some(buy.to_ref()),
            sell: sell.to_ref(),
            quantity,
            amount: Money::new(amount, Currency::EUR),
            cause: CloseCause::Sell,
        }
    }

    #[test]
    fn totals_over_closed_positions() {
        let positions = vec![closed(dec!(100), dec!(5000)), closed(dec!(110), dec!(6050))];
        assert_eq!(
            total_amount(&positions),
            Some(Money::new(dec!(11050), Currency::EUR))
        );
        assert_eq!(total_quantity(&positions), dec!(210));
        assert_eq!(total_amount::<()>(&[]), None);
        assert_eq!(total_quantity::<()>(&[]), Decimal::ZERO);
    }

    #[test]
    fn closed_position_exposes_both_sources() {
        let position = closed(dec!(2), dec!(66.67));
        assert_eq!(position.buy_source(), Some(&"buy"));
        assert_eq!(position.sell_source(), Some(&"sell"));
        assert!(position.buy_id().is_some());
    }

    #[test]
    fn settlement_reports_unmatched_quantity() {
        let sell = TradeEvent::sell(dec!(4), "s");
        let settlement = Settlement {
            event: sell.to_ref(),
            cause: CloseCause::Sell,
            requested: dec!(4),
            matched: dec!(3),
            amount: Some(Money::new(dec!(100), Currency::EUR)),
            consumed: vec![None],
        };
        assert_eq!(settlement.unmatched(), dec!(1));
        assert!(!settlement.is_complete());
    }

    #[test]
    fn close_cause_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&CloseCause::Rbt).unwrap(), "\"RBT\"");
    }
}
