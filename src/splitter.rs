use crate::error::{Result, StockError};
use crate::inventory::{Inventory, Strategy};
use crate::money::ArithmeticError;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::trace;

/// Rescales every open quantity by `after / before`. Amounts are unchanged.
///
/// Rounded half up at `scale`, except the head lot which takes the rescaled
/// total minus the others so that the total is conserved. A `before` of
/// exactly one multiplies without rounding.
pub fn split<S>(inventory: &mut Inventory<S>, before: Decimal, after: Decimal, scale: u32) -> Result<()> {
    if before <= Decimal::ZERO || after < Decimal::ZERO {
        return Err(StockError::InvalidSplit { before, after });
    }
    if inventory.is_empty() {
        return Ok(());
    }

    if before == Decimal::ONE {
        for lot in inventory.iter_mut() {
            lot.quantity = lot
                .quantity
                .checked_mul(after)
                .ok_or(ArithmeticError::Overflow)?;
        }
        return Ok(());
    }

    let rescale = |quantity: Decimal| -> Result<Decimal> {
        let product = quantity.checked_mul(after).ok_or(ArithmeticError::Overflow)?;
        let quotient = product.checked_div(before).ok_or(ArithmeticError::Overflow)?;
        Ok(quotient.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero))
    };

    let mut total = rescale(inventory.quantity())?;
    let mut rescaled = Vec::with_capacity(inventory.len());
    for lot in inventory.iter().skip(1) {
        let quantity = rescale(lot.quantity)?;
        total -= quantity;
        rescaled.push(quantity);
    }
    if total < Decimal::ZERO {
        return Err(StockError::NegativeQuantity { quantity: total });
    }

    let mut lots = inventory.iter_mut();
    if let Some(head) = lots.next() {
        trace!(before = %head.quantity, after = %total, "head lot rescaled");
        head.quantity = total;
    }
    for (lot, quantity) in lots.zip(rescaled) {
        trace!(before = %lot.quantity, after = %quantity, "lot rescaled");
        lot.quantity = quantity;
    }
    Ok(())
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::inventory::Mode;
    use crate::money::{Currency, Money};
    use crate::unrealized::Lot;
    use rust_decimal_macros::dec;

    fn stocked(mode: Mode, lots: &[(Decimal, Decimal)]) -> Inventory<()> {
        let mut inventory = Inventory::new(mode);
        for (q, a) in lots {
            inventory.add(Lot::new(None, *q, Money::new(*a, Currency::EUR)));
        }
        inventory
    }

    fn quantities(inventory: &Inventory<()>) -> Vec<Decimal> {
        inventory.iter().map(|l| l.quantity()).collect()
    }

    #[test]
    fn before_of_one_multiplies() {
        let mut inventory = stocked(Mode::Fifo, &[(dec!(3), dec!(10)), (dec!(2), dec!(5))]);
        split(&mut inventory, dec!(1), dec!(3), 0).unwrap();
        assert_eq!(quantities(&inventory), vec![dec!(9), dec!(6)]);
    }

    #[test]
    fn head_lot_absorbs_the_rounding_residue() {
        let mut inventory = stocked(
            Mode::Fifo,
            &[(dec!(7), dec!(33.33)), (dec!(3), dec!(50)), (dec!(2), dec!(10))],
        );
        split(&mut inventory, dec!(3), dec!(2), 6).unwrap();
        assert_eq!(
            quantities(&inventory),
            vec![dec!(4.666667), dec!(2), dec!(1.333333)]
        );
        assert_eq!(inventory.quantity(), dec!(8));
        let amounts: Vec<_> = inventory.iter().map(|l| l.amount().amount()).collect();
        assert_eq!(amounts, vec![dec!(33.33), dec!(50), dec!(10)]);
    }

    #[test]
    fn invalid_ratio_is_rejected() {
        let mut inventory = stocked(Mode::Fifo, &[(dec!(3), dec!(10))]);
        assert!(matches!(
            split(&mut inventory, dec!(0), dec!(2), 2),
            Err(StockError::InvalidSplit { .. })
        ));
        assert!(matches!(
            split(&mut inventory, dec!(2), dec!(-1), 2),
            Err(StockError::InvalidSplit { .. })
        ));
        assert_eq!(quantities(&inventory), vec![dec!(3)]);
    }

    #[test]
    fn head_lot_cannot_go_negative() {
        let lots = [(dec!(2), dec!(1)); 5];
        let mut inventory = stocked(Mode::Fifo, &lots);
        let err = split(&mut inventory, dec!(4), dec!(1), 0).unwrap_err();
        assert_eq!(err, StockError::NegativeQuantity { quantity: dec!(-1) });
        assert_eq!(inventory.quantity(), dec!(10));
    }

    #[test]
    fn empty_inventory_is_left_alone() {
        let mut inventory = stocked(Mode::Lifo, &[]);
        split(&mut inventory, dec!(2), dec!(1), 2).unwrap();
        assert!(inventory.is_empty());
    }
}
