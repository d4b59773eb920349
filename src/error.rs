use crate::money::{ArithmeticError, Currency, Money};
use rust_decimal::Decimal;
use thiserror::Error;

/// Failures raised while processing a trade event.
///
/// Validation errors leave the manager untouched. The ones reported by
/// [`StockError::is_fatal`] mean an internal invariant broke and the
/// manager's state can no longer be trusted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StockError {
    #[error("modification of an empty position")]
    EmptyPositionModification,

    #[error("modification {modification_amount} exceeds the stock amount {stock_amount}")]
    StockAmountReduction {
        stock_amount: Money,
        modification_amount: Money,
    },

    #[error("forced modifications {forced_total} exceed the modification {modification_amount}")]
    InvalidForcedTotal {
        modification_amount: Money,
        forced_total: Money,
    },

    #[error("lot amount would become negative: {amount}")]
    NegativeLot { amount: Money },

    #[error("lot quantity would become negative: {quantity}")]
    NegativeQuantity { quantity: Decimal },

    #[error("planned change for lot {index} but only {len} lots are open")]
    MissingLot { index: usize, len: usize },

    #[error("expected an amount in {expected}, found {found}")]
    CurrencyMismatch { expected: Currency, found: Currency },

    #[error("invalid quantity modification {before} -> {after}")]
    InvalidSplit { before: Decimal, after: Decimal },

    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
}

impl StockError {
    /// Internal invariant violations, as opposed to rejected input.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StockError::InvalidForcedTotal { .. }
                | StockError::NegativeLot { .. }
                | StockError::NegativeQuantity { .. }
                | StockError::MissingLot { .. }
                | StockError::Arithmetic(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StockError>;

#[cfg(test)]
mod tests {

    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn validation_errors_are_not_fatal() {
        let eur = |d| Money::new(d, Currency::EUR);
        assert!(!StockError::EmptyPositionModification.is_fatal());
        assert!(!StockError::StockAmountReduction {
            stock_amount: eur(dec!(100)),
            modification_amount: eur(dec!(-200)),
        }
        .is_fatal());
        assert!(StockError::InvalidForcedTotal {
            modification_amount: eur(dec!(-10)),
            forced_total: eur(dec!(-11)),
        }
        .is_fatal());
        assert!(StockError::from(ArithmeticError::Overflow).is_fatal());
        assert!(StockError::MissingLot { index: 3, len: 2 }.is_fatal());
    }

    #[test]
    fn unrepresentable_float_is_fatal_and_reported() {
        let err = StockError::from(ArithmeticError::Unrepresentable(f64::INFINITY));
        assert!(err.is_fatal());
        assert_eq!(
            err,
            StockError::Arithmetic(ArithmeticError::Unrepresentable(f64::INFINITY))
        );
        assert!(err.to_string().contains("inf"));
    }

    #[test]
    fn messages_carry_the_amounts() {
        let err = StockError::StockAmountReduction {
            stock_amount: Money::new(dec!(100), Currency::EUR),
            modification_amount: Money::new(dec!(-200), Currency::EUR),
        };
        assert_eq!(
            err.to_string(),
            "modification -200 EUR exceeds the stock amount 100 EUR"
        );
    }
}
