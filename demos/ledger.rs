/// Example taking a small trade ledger to compute closed positions and remaining stock per symbol
use chrono::NaiveDate;
use lotbasis::realized::{total_amount, total_quantity};
use lotbasis::{Currency, Mode, Money, StockConfig, StockManager, TradeEvent};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::error::Error;
use tracing_subscriber::EnvFilter;

// date, type, symbol, quantity, amount (EUR)
const LEDGER: &str = "\
date,type,symbol,quantity,amount
2021-01-04,buy,ACME,100,5000.00
2021-02-01,buy,ACME,125,6875.00
2021-01-15,buy,GLOBEX,7,100.00
2021-03-01,buy,ACME,75,4425.00
2021-03-10,sell,GLOBEX,3,
2021-04-12,sell,ACME,210,
2021-05-03,mod,ACME,,-150.00
2021-06-01,split,GLOBEX,1:3,
2021-07-01,rbt,GLOBEX,,
2021-08-02,sell,ACME,100,
";

type Event = TradeEvent<(NaiveDate, String)>;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // events per symbol, in date order
    let ledger = get_events(LEDGER)?;
    println!("EVENTS LOADED");

    let config = StockConfig::new(Mode::Fifo);
    for (symbol, events) in ledger {
        let mut manager = StockManager::with_config(config);
        manager.process(events)?;

        println!("-------------------------------------------------------------");
        println!("SYMBOL: {} __ {}", symbol, manager);
        let closed = manager.closed_positions();
        if let Some(amount) = total_amount(closed) {
            println!("CLOSED: quantity {} amount {}", total_quantity(closed), amount);
        }
        for position in closed {
            match position.sell_source() {
                Some((date, _)) => println!("  {} {}", date, position),
                None => println!("  {}", position),
            }
        }
        for position in manager.opened_positions() {
            println!("  {}", position);
        }
        for orphan in manager.orphan_events() {
            println!("  {}", orphan);
        }
    }
    Ok(())
}

fn get_events(text: &str) -> Result<BTreeMap<String, Vec<Event>>, Box<dyn Error>> {
    let mut rows = Vec::new();
    for line in text.lines().skip(1).filter(|l| !l.trim().is_empty()) {
        let field: Vec<&str> = line.split(',').map(str::trim).collect();
        if field.len() != 5 {
            return Err(format!("malformed ledger line '{}'", line).into());
        }
        let date = NaiveDate::parse_from_str(field[0], "%Y-%m-%d")?;
        rows.push((date, field[1].to_owned(), field[2].to_owned(), field[3].to_owned(), field[4].to_owned()));
    }
    // stable: same day events keep their ledger order
    rows.sort_by_key(|row| row.0);

    let mut events: BTreeMap<String, Vec<Event>> = BTreeMap::new();
    for (date, kind, symbol, quantity, amount) in rows {
        let source = (date, symbol.clone());
        let event = match kind.as_str() {
            "buy" => TradeEvent::buy(quantity.parse()?, eur(&amount)?, source),
            "sell" => TradeEvent::sell(quantity.parse()?, source),
            "rbt" if quantity.is_empty() => TradeEvent::full_reimbursement(source),
            "rbt" => TradeEvent::reimbursement(quantity.parse()?, source),
            "mod" => TradeEvent::modification(eur(&amount)?, source),
            "split" => {
                let (before, after) = quantity
                    .split_once(':')
                    .ok_or_else(|| format!("split needs before:after, got '{}'", quantity))?;
                TradeEvent::modify_quantity(before.parse()?, after.parse()?, 6, source)
            }
            other => return Err(format!("unknown event type '{}'", other).into()),
        };
        events.entry(symbol).or_default().push(event);
    }
    Ok(events)
}

fn eur(amount: &str) -> Result<Money, Box<dyn Error>> {
    Ok(Money::new(amount.parse::<Decimal>()?, Currency::EUR))
}
