//! Integer-cent money arithmetic.
//!
//! Every amount handled by the service is a whole number of euro cents.
//! Rounding only happens where a rate or a fractional quantity is applied,
//! always half-up (away from zero), to the nearest cent.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};
use thiserror::Error;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("amount out of range")]
pub struct MoneyError;

/// An amount of euro cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type)]
#[sqlx(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Convert a euro amount, rounding half-up to the cent.
    pub fn from_decimal(euros: Decimal) -> Result<Self, MoneyError> {
        let cents = euros.checked_mul(HUNDRED).ok_or(MoneyError)?;
        round_to_cents(cents).map(Money)
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `self × rate / 100`, rounded half-up to the cent.
    pub fn percentage(self, rate: Decimal) -> Result<Money, MoneyError> {
        let scaled = Decimal::from(self.0)
            .checked_mul(rate)
            .and_then(|v| v.checked_div(HUNDRED))
            .ok_or(MoneyError)?;
        round_to_cents(scaled).map(Money)
    }

    /// `self × quantity × (1 − discount/100)`, rounded half-up to the cent.
    pub fn extend(self, quantity: Decimal, discount: Decimal) -> Result<Money, MoneyError> {
        let kept = HUNDRED.checked_sub(discount).ok_or(MoneyError)?;
        let scaled = Decimal::from(self.0)
            .checked_mul(quantity)
            .and_then(|v| v.checked_mul(kept))
            .and_then(|v| v.checked_div(HUNDRED))
            .ok_or(MoneyError)?;
        round_to_cents(scaled).map(Money)
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

fn round_to_cents(value: Decimal) -> Result<i64, MoneyError> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(MoneyError)
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal().to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let euros = <Decimal as Deserialize>::deserialize(deserializer)?;
        Money::from_decimal(euros).map_err(serde::de::Error::custom)
    }
}
