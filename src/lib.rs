//! Lotbasis library keeps the open lots of a security under a cost basis policy. As trade
//! events are added, lots are opened, consumed into closed positions, revalued or rescaled.
//!
//! - `StockManager` - owns the lots and dispatches every event
//! - `Inventory` - ordering policy of the lots: FIFO, LIFO or PRMP (weighted average)
//! - `TradeEvent` - buy, sell, reimbursement, money modification or quantity modification
//! - `ClosedPosition` - quantity and amount a sell took from one buy lot
//! - `OpenPosition` - snapshot of a lot still held
//! - `Modification` - amount change of one lot caused by one modification event
//!
//! Every redistribution conserves its total exactly: the rounding residue lands on one
//! designated lot, and no lot ever ends with a negative amount.
//!
//! Example
//! ```
//! use lotbasis::inventory::Mode;
//! use lotbasis::manager::StockManager;
//! use lotbasis::money::{Currency, Money};
//! use lotbasis::transaction::TradeEvent;
//! use rust_decimal::Decimal;
//!
//! let eur = |s: &str| Money::new(s.parse::<Decimal>().unwrap(), Currency::EUR);
//!
//! let mut manager = StockManager::new(Mode::Fifo);
//! manager
//!     .process([
//!         TradeEvent::buy(Decimal::from(3), eur("100.00"), "buy"),
//!         TradeEvent::sell(Decimal::from(2), "sell"),
//!     ])
//!     .unwrap();
//!
//! let closed = manager.closed_positions();
//! assert_eq!(closed[0].quantity, Decimal::from(2));
//! assert_eq!(closed[0].amount, eur("66.67"));
//!
//! // what is left of the lot
//! let opened = manager.opened_positions();
//! assert_eq!(opened[0].quantity, Decimal::from(1));
//! assert_eq!(opened[0].amount, eur("33.33"));
//! ```
//!
//! Look also in the demos directory.

/// tunable settings of a `StockManager`
pub mod config;
/// `StockError` raised while processing an event
pub mod error;
/// lot ordering strategies and the `Inventory` enum over them
pub mod inventory;
/// orchestration of trade events over an inventory
pub mod manager;
/// sell and reimbursement consumption of lots
pub mod matcher;
/// redistribution of money modifications over lots
pub mod modifier;
/// decimal money, currency and rounding
pub mod money;
/// forced allocations keyed by event identity
pub mod overrides;
/// closed positions, orphans and settlements - realized side
pub mod realized;
/// quantity rescale of every lot
pub mod splitter;
/// `TradeEvent` and its identity
pub mod transaction;
/// lots and open positions - unrealized side
pub mod unrealized;

pub use config::StockConfig;
pub use error::StockError;
pub use inventory::Mode;
pub use manager::StockManager;
pub use modifier::Modification;
pub use money::{Currency, Money, Rounding, RoundingMode};
pub use realized::{CloseCause, ClosedPosition, OrphanEvent, Settlement};
pub use transaction::{EventId, ModificationMode, TradeEvent};
pub use unrealized::{OpenPosition, Stock};
