use crate::unrealized::{Lot, Stock};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::vec_deque::{Iter, IterMut};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Which lot a sell consumes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// first in, first out
    #[default]
    #[serde(rename = "FIFO")]
    Fifo,
    /// last in, first out
    #[serde(rename = "LIFO")]
    Lifo,
    /// weighted average price, all buys merged into one lot
    #[serde(rename = "PRMP")]
    Prmp,
}

impl FromStr for Mode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FIFO" | "fifo" => Ok(Mode::Fifo),
            "LIFO" | "lifo" => Ok(Mode::Lifo),
            "PRMP" | "prmp" | "average" => Ok(Mode::Prmp),
            _ => Err(format!("'{}' is not a valid value for Mode", s)),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Fifo => "FIFO",
            Mode::Lifo => "LIFO",
            Mode::Prmp => "PRMP",
        };
        f.write_str(s)
    }
}

/// Ordering and merging policy over open lots.
///
/// Lots are kept in canonical order: the head, the next lot to be consumed,
/// comes first. Implementors only decide where a new lot goes.
pub trait Strategy<S> {
    fn add(&mut self, lot: Lot<S>);

    fn lots(&self) -> &VecDeque<Lot<S>>;

    fn lots_mut(&mut self) -> &mut VecDeque<Lot<S>>;

    fn peek(&self) -> Option<&Lot<S>> {
        self.lots().front()
    }

    fn peek_mut(&mut self) -> Option<&mut Lot<S>> {
        self.lots_mut().front_mut()
    }

    /// Evicts the head.
    fn remove(&mut self) -> Option<Lot<S>> {
        self.lots_mut().pop_front()
    }

    fn is_empty(&self) -> bool {
        self.lots().is_empty()
    }

    fn len(&self) -> usize {
        self.lots().len()
    }

    fn iter(&self) -> Iter<'_, Lot<S>> {
        self.lots().iter()
    }

    fn iter_mut(&mut self) -> IterMut<'_, Lot<S>> {
        self.lots_mut().iter_mut()
    }

    fn quantity(&self) -> Decimal {
        self.iter().map(|lot| lot.quantity).sum()
    }

    /// Synthetic aggregate of every open lot.
    fn stock(&self) -> Stock {
        let mut lots = self.iter();
        let Some(first) = lots.next() else {
            return Stock::empty();
        };
        let (quantity, amount) = lots.fold((first.quantity, first.amount), |(q, a), lot| {
            (q + lot.quantity, a + lot.amount)
        });
        Stock {
            quantity,
            amount: Some(amount),
        }
    }
}

/// Queue: the head is the oldest buy.
#[derive(Debug, Clone)]
pub struct Fifo<S> {
    lots: VecDeque<Lot<S>>,
}

/// Stack: the head is the most recent buy.
#[derive(Debug, Clone)]
pub struct Lifo<S> {
    lots: VecDeque<Lot<S>>,
}

/// One aggregate cell holding the sum of every buy.
#[derive(Debug, Clone)]
pub struct WeightedAverage<S> {
    cell: VecDeque<Lot<S>>,
}

impl<S> Default for Fifo<S> {
    fn default() -> Self {
        Fifo {
            lots: VecDeque::new(),
        }
    }
}

impl<S> Default for Lifo<S> {
    fn default() -> Self {
        Lifo {
            lots: VecDeque::new(),
        }
    }
}

impl<S> Default for WeightedAverage<S> {
    fn default() -> Self {
        WeightedAverage {
            cell: VecDeque::with_capacity(1),
        }
    }
}

impl<S> Strategy<S> for Fifo<S> {
    fn add(&mut self, lot: Lot<S>) {
        self.lots.push_back(lot);
    }

    fn lots(&self) -> &VecDeque<Lot<S>> {
        &self.lots
    }

    fn lots_mut(&mut self) -> &mut VecDeque<Lot<S>> {
        &mut self.lots
    }
}

impl<S> Strategy<S> for Lifo<S> {
    fn add(&mut self, lot: Lot<S>) {
        self.lots.push_front(lot);
    }

    fn lots(&self) -> &VecDeque<Lot<S>> {
        &self.lots
    }

    fn lots_mut(&mut self) -> &mut VecDeque<Lot<S>> {
        &mut self.lots
    }
}

impl<S> Strategy<S> for WeightedAverage<S> {
    /// Merges into the aggregate; the buy's own identity is not kept.
    fn add(&mut self, lot: Lot<S>) {
        match self.cell.front_mut() {
            Some(aggregate) => {
                aggregate.quantity += lot.quantity;
                aggregate.amount += lot.amount;
            }
            None => self.cell.push_back(Lot::new(None, lot.quantity, lot.amount)),
        }
    }

    fn lots(&self) -> &VecDeque<Lot<S>> {
        &self.cell
    }

    fn lots_mut(&mut self) -> &mut VecDeque<Lot<S>> {
        &mut self.cell
    }

    /// A cell left without quantity holds nothing to sell or modify.
    fn is_empty(&self) -> bool {
        self.cell
            .front()
            .map_or(true, |aggregate| aggregate.quantity.is_zero())
    }
}

/// The three strategies behind one type, picked by `Mode`.
#[derive(Debug, Clone)]
pub enum Inventory<S> {
    Fifo(Fifo<S>),
    Lifo(Lifo<S>),
    Prmp(WeightedAverage<S>),
}

impl<S> Inventory<S> {
    pub fn new(mode: Mode) -> Self {
        match mode {
            Mode::Fifo => Inventory::Fifo(Fifo::default()),
            Mode::Lifo => Inventory::Lifo(Lifo::default()),
            Mode::Prmp => Inventory::Prmp(WeightedAverage::default()),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Inventory::Fifo(_) => Mode::Fifo,
            Inventory::Lifo(_) => Mode::Lifo,
            Inventory::Prmp(_) => Mode::Prmp,
        }
    }
}

impl<S> Strategy<S> for Inventory<S> {
    fn add(&mut self, lot: Lot<S>) {
        match self {
            Inventory::Fifo(s) => s.add(lot),
            Inventory::Lifo(s) => s.add(lot),
            Inventory::Prmp(s) => s.add(lot),
        }
    }

    fn lots(&self) -> &VecDeque<Lot<S>> {
        match self {
            Inventory::Fifo(s) => s.lots(),
            Inventory::Lifo(s) => s.lots(),
            Inventory::Prmp(s) => s.lots(),
        }
    }

    fn lots_mut(&mut self) -> &mut VecDeque<Lot<S>> {
        match self {
            Inventory::Fifo(s) => s.lots_mut(),
            Inventory::Lifo(s) => s.lots_mut(),
            Inventory::Prmp(s) => s.lots_mut(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Inventory::Fifo(s) => s.is_empty(),
            Inventory::Lifo(s) => s.is_empty(),
            Inventory::Prmp(s) => s.is_empty(),
        }
    }
}
