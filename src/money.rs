use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ArithmeticError {
    #[error("division by zero")]
    DivisionByZero,
    /// The quotient has no terminating decimal expansion.
    #[error("quotient has no exact decimal representation")]
    NonTerminating,
    #[error("decimal overflow")]
    Overflow,
    #[error("value {0} cannot be represented as a decimal")]
    Unrepresentable(f64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseMoneyError {
    #[error("'{0}' is not a three letter currency code")]
    Currency(String),
    #[error("'{0}' is not a valid amount")]
    Amount(String),
    #[error("'{0}' is missing a currency, expected e.g. '12.50 EUR'")]
    Format(String),
}

/// Three letter upper case currency code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    pub const EUR: Currency = Currency(*b"EUR");
    pub const USD: Currency = Currency(*b"USD");
    pub const GBP: Currency = Currency(*b"GBP");

    pub fn new(code: &str) -> Result<Self, ParseMoneyError> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_uppercase()) {
            return Err(ParseMoneyError::Currency(code.to_owned()));
        }
        Ok(Currency([bytes[0], bytes[1], bytes[2]]))
    }

    pub fn code(&self) -> &str {
        // only ascii upper case bytes are ever stored
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl FromStr for Currency {
    type Err = ParseMoneyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::new(s.trim())
    }
}

impl TryFrom<String> for Currency {
    type Error = ParseMoneyError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Currency::new(&s)
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.code().to_owned()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.code())
    }
}

/// Rounding strategies available to the monetary rounding operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundingMode {
    HalfEven,
    HalfUp,
    HalfDown,
    Up,
    Down,
    Ceiling,
    Floor,
}

impl RoundingMode {
    fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::HalfDown => RoundingStrategy::MidpointTowardZero,
            RoundingMode::Up => RoundingStrategy::AwayFromZero,
            RoundingMode::Down => RoundingStrategy::ToZero,
            RoundingMode::Ceiling => RoundingStrategy::ToPositiveInfinity,
            RoundingMode::Floor => RoundingStrategy::ToNegativeInfinity,
        }
    }
}

/// Monetary rounding operator: a number of decimal places and a strategy.
///
/// Defaults to two decimal places with banker's rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rounding {
    pub scale: u32,
    pub mode: RoundingMode,
}

impl Rounding {
    pub const fn new(scale: u32, mode: RoundingMode) -> Self {
        Rounding { scale, mode }
    }

    pub fn apply(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.scale, self.mode.strategy())
    }
}

impl Default for Rounding {
    fn default() -> Self {
        Rounding::new(2, RoundingMode::HalfEven)
    }
}

/// An amount of money tagged with its currency.
///
/// Arithmetic operators expect both sides in the same currency. The stock
/// manager checks currencies where amounts enter the engine, so mixing them
/// here is a programming error caught by a debug assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Money { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Money::new(Decimal::ZERO, currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// `1`, `0` or `-1`.
    pub fn signum(&self) -> i32 {
        if self.is_positive() {
            1
        } else if self.is_negative() {
            -1
        } else {
            0
        }
    }

    pub fn abs(&self) -> Money {
        Money::new(self.amount.abs(), self.currency)
    }

    pub fn round(&self, rounding: &Rounding) -> Money {
        Money::new(rounding.apply(self.amount), self.currency)
    }

    pub fn checked_mul(&self, factor: Decimal) -> Result<Money, ArithmeticError> {
        self.amount
            .checked_mul(factor)
            .map(|a| Money::new(a, self.currency))
            .ok_or(ArithmeticError::Overflow)
    }

    /// `self * part / whole`, rounded with `rounding`.
    pub fn prorate(
        &self,
        part: Decimal,
        whole: Decimal,
        rounding: &Rounding,
    ) -> Result<Money, ArithmeticError> {
        let share = prorate(self.amount, part, whole)?;
        Ok(Money::new(rounding.apply(share), self.currency))
    }

    pub fn same_currency(&self, other: &Money) -> bool {
        self.currency == other.currency
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        debug_assert_eq!(self.currency, rhs.currency, "currency mismatch");
        Money::new(self.amount + rhs.amount, self.currency)
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        debug_assert_eq!(self.currency, rhs.currency, "currency mismatch");
        Money::new(self.amount - rhs.amount, self.currency)
    }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        Money::new(-self.amount, self.currency)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        *self = *self - rhs;
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// Parses `"<amount> <currency>"`, e.g. `"33.33 EUR"`.
impl FromStr for Money {
    type Err = ParseMoneyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(amount), Some(currency), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseMoneyError::Format(s.to_owned()));
        };
        let amount =
            Decimal::from_str(amount).map_err(|_| ParseMoneyError::Amount(amount.to_owned()))?;
        Ok(Money::new(amount, currency.parse()?))
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// True when `num / den` has a terminating decimal expansion.
///
/// Both operands are `mantissa * 10^-scale`, so the powers of ten never
/// matter: the quotient terminates iff the reduced denominator of the
/// mantissa ratio only has 2 and 5 as prime factors.
fn terminates(num: Decimal, den: Decimal) -> bool {
    let a = num.mantissa().unsigned_abs();
    let b = den.mantissa().unsigned_abs();
    if a == 0 {
        return true;
    }
    let mut reduced = b / gcd(a, b);
    while reduced % 2 == 0 {
        reduced /= 2;
    }
    while reduced % 5 == 0 {
        reduced /= 5;
    }
    reduced == 1
}

/// Exact decimal division.
///
/// Fails with [`ArithmeticError::NonTerminating`] when the quotient has no
/// finite decimal expansion, the signal the engine uses to switch to its
/// floating point fallback.
pub fn exact_div(num: Decimal, den: Decimal) -> Result<Decimal, ArithmeticError> {
    if den.is_zero() {
        return Err(ArithmeticError::DivisionByZero);
    }
    if !terminates(num, den) {
        return Err(ArithmeticError::NonTerminating);
    }
    num.checked_div(den).ok_or(ArithmeticError::Overflow)
}

/// `value * part / whole` without rounding.
///
/// Uses exact division when the quotient terminates and falls back to `f64`
/// division otherwise. The fallback is an approximation; callers always pass
/// the result through a rounding operator.
pub fn prorate(value: Decimal, part: Decimal, whole: Decimal) -> Result<Decimal, ArithmeticError> {
    let product = value.checked_mul(part).ok_or(ArithmeticError::Overflow)?;
    match exact_div(product, whole) {
        Err(ArithmeticError::NonTerminating) => float_div(product, whole),
        other => other,
    }
}

fn float_div(num: Decimal, den: Decimal) -> Result<Decimal, ArithmeticError> {
    let n = num.to_f64().ok_or(ArithmeticError::Overflow)?;
    let d = den.to_f64().ok_or(ArithmeticError::Overflow)?;
    let x = n / d;
    Decimal::from_f64(x).ok_or(ArithmeticError::Unrepresentable(x))
}

#[cfg(test)]
mod tests {

    use super::*;
    use rust_decimal_macros::dec;

    fn eur(s: &str) -> Money {
        Money::new(Decimal::from_str(s).unwrap(), Currency::EUR)
    }

    #[test]
    fn parse_money_with_currency() {
        let m: Money = "33.33 EUR".parse().unwrap();
        assert_eq!(m, eur("33.33"));
        assert_eq!(m.to_string(), "33.33 EUR");
        assert!("33.33".parse::<Money>().is_err());
        assert!("abc EUR".parse::<Money>().is_err());
        assert!("1 euro".parse::<Money>().is_err());
    }

    #[test]
    fn currency_codes_are_validated() {
        assert_eq!(Currency::new("USD").unwrap(), Currency::USD);
        assert!(Currency::new("usd").is_err());
        assert!(Currency::new("EURO").is_err());
    }

    #[test]
    fn terminating_quotients_are_exact() {
        assert_eq!(exact_div(dec!(5.17), dec!(4)), Ok(dec!(1.2925)));
        assert_eq!(exact_div(dec!(66.66), dec!(3)), Ok(dec!(22.22)));
        assert_eq!(exact_div(dec!(1), dec!(0.8)), Ok(dec!(1.25)));
        assert_eq!(exact_div(dec!(0), dec!(7)), Ok(dec!(0)));
    }

    #[test]
    fn repeating_quotient_signals_non_terminating() {
        assert_eq!(exact_div(dec!(200), dec!(3)), Err(ArithmeticError::NonTerminating));
        assert_eq!(exact_div(dec!(1), dec!(0)), Err(ArithmeticError::DivisionByZero));
    }

    #[test]
    fn prorate_falls_back_to_float_then_rounds() {
        let share = eur("100.00").prorate(dec!(2), dec!(3), &Rounding::default()).unwrap();
        assert_eq!(share, eur("66.67"));
        let share = eur("5.17").prorate(dec!(1), dec!(4), &Rounding::default()).unwrap();
        assert_eq!(share, eur("1.29"));
    }

    #[test]
    fn rounding_modes_differ_on_midpoint() {
        let even = Rounding::new(2, RoundingMode::HalfEven);
        let up = Rounding::new(2, RoundingMode::HalfUp);
        assert_eq!(even.apply(dec!(1.2925)), dec!(1.29));
        assert_eq!(even.apply(dec!(1.2950)), dec!(1.30));
        assert_eq!(even.apply(dec!(1.2850)), dec!(1.28));
        assert_eq!(up.apply(dec!(1.2850)), dec!(1.29));
    }

    #[test]
    fn signum_and_abs() {
        assert_eq!(eur("-10").signum(), -1);
        assert_eq!(eur("0").signum(), 0);
        assert_eq!(eur("0.01").signum(), 1);
        assert_eq!(eur("-10").abs(), eur("10"));
        assert_eq!(eur("3") - eur("5"), eur("-2"));
    }
}
