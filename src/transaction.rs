use crate::money::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity of one trade event.
///
/// Minted when the event is constructed, so two events built from identical
/// values are still distinct. Override tables are keyed by this token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    fn mint() -> Self {
        EventId(Uuid::new_v4())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of an event together with the caller's correlation handle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRef<S> {
    pub id: EventId,
    pub source: Option<S>,
}

/// How a modification is spread over several open lots.
///
/// Only used when more than one lot is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModificationMode {
    /// in proportion to quantity
    Quantity,
    /// in proportion to amount
    Money,
    /// increase by quantity, reduction by amount
    #[default]
    Mixed,
    /// reduction by quantity first, by amount if a lot would go negative
    QuantityFirst,
}

impl FromStr for ModificationMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUANTITY" | "quantity" => Ok(ModificationMode::Quantity),
            "MONEY" | "money" | "amount" => Ok(ModificationMode::Money),
            "MIXED" | "mixed" => Ok(ModificationMode::Mixed),
            "QUANTITY_FIRST" | "quantity_first" => Ok(ModificationMode::QuantityFirst),
            _ => Err(format!("'{}' is not a valid value for ModificationMode", s)),
        }
    }
}

/// Kind specific payload of a `TradeEvent`.
///
/// Quantities are normalized to non-negative by the constructors.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Buy {
        quantity: Decimal,
        amount: Money,
    },
    Sell {
        quantity: Decimal,
    },
    /// Signed money adjustment of the open lots.
    Modification {
        delta: Money,
        mode: Option<ModificationMode>,
    },
    /// Rescales every open quantity by `after / before`, rounded half up at `scale`.
    QuantityModification {
        before: Decimal,
        after: Decimal,
        scale: u32,
    },
    /// Reimbursement; `None` liquidates the whole inventory.
    Reimbursement {
        quantity: Option<Decimal>,
    },
}

/// A single trade event fed to the `StockManager`, in chronological order.
///
/// `source` is an opaque caller handle returned untouched in every record
/// that refers to this event.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeEvent<S = ()> {
    id: EventId,
    source: Option<S>,
    kind: EventKind,
}

impl<S> TradeEvent<S> {
    fn new(kind: EventKind, source: Option<S>) -> Self {
        TradeEvent {
            id: EventId::mint(),
            source,
            kind,
        }
    }

    pub fn buy(quantity: Decimal, amount: Money, source: S) -> Self {
        Self::new(
            EventKind::Buy {
                quantity: quantity.abs(),
                amount,
            },
            Some(source),
        )
    }

    /// Buy priced per unit: same as `buy(quantity, unit_amount * quantity, source)`.
    pub fn buy_unit_amount(quantity: Decimal, unit_amount: Money, source: S) -> Self {
        let quantity = quantity.abs();
        let amount = Money::new(unit_amount.amount() * quantity, unit_amount.currency());
        Self::buy(quantity, amount, source)
    }

    pub fn sell(quantity: Decimal, source: S) -> Self {
        Self::new(
            EventKind::Sell {
                quantity: quantity.abs(),
            },
            Some(source),
        )
    }

    /// Positive or negative adjustment of the open lots amount.
    pub fn modification(delta: Money, source: S) -> Self {
        Self::new(EventKind::Modification { delta, mode: None }, Some(source))
    }

    /// Modification without a caller handle.
    pub fn anonymous_modification(delta: Money) -> Self {
        Self::new(EventKind::Modification { delta, mode: None }, None)
    }

    pub fn modification_with_mode(delta: Money, mode: ModificationMode, source: S) -> Self {
        Self::new(
            EventKind::Modification {
                delta,
                mode: Some(mode),
            },
            Some(source),
        )
    }

    pub fn modify_quantity(before: Decimal, after: Decimal, scale: u32, source: S) -> Self {
        Self::new(
            EventKind::QuantityModification {
                before,
                after,
                scale,
            },
            Some(source),
        )
    }

    pub fn reimbursement(quantity: Decimal, source: S) -> Self {
        Self::new(
            EventKind::Reimbursement {
                quantity: Some(quantity.abs()),
            },
            Some(source),
        )
    }

    /// Reimbursement of everything still held.
    pub fn full_reimbursement(source: S) -> Self {
        Self::new(EventKind::Reimbursement { quantity: None }, Some(source))
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn source(&self) -> Option<&S> {
        self.source.as_ref()
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Delta carried by a modification event.
    pub fn delta(&self) -> Option<Money> {
        match self.kind {
            EventKind::Modification { delta, .. } => Some(delta),
            _ => None,
        }
    }

    pub(crate) fn into_parts(self) -> (EventRef<S>, EventKind) {
        (
            EventRef {
                id: self.id,
                source: self.source,
            },
            self.kind,
        )
    }
}

impl<S: Clone> TradeEvent<S> {
    pub fn to_ref(&self) -> EventRef<S> {
        EventRef {
            id: self.id,
            source: self.source.clone(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Buy { quantity, amount } => write!(f, "BUY quantity:{}, amount:{}", quantity, amount),
            EventKind::Sell { quantity } => write!(f, "SELL quantity:{}", quantity),
            EventKind::Modification { delta, mode } => match mode {
                Some(mode) => write!(f, "MODIFICATION delta:{}, mode:{:?}", delta, mode),
                None => write!(f, "MODIFICATION delta:{}", delta),
            },
            EventKind::QuantityModification { before, after, scale } => {
                write!(f, "MODIFICATION_QUANTITY {}->{} scale:{}", before, after, scale)
            }
            EventKind::Reimbursement { quantity: Some(q) } => write!(f, "RBT quantity:{}", q),
            EventKind::Reimbursement { quantity: None } => write!(f, "RBT quantity:all"),
        }
    }
}
