/// Decimal price value type
///
/// `Price` is `Copy`, so snapshots and projections always hold their own value.
/// A cleared price is zero.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    pub const ZERO: Price = Price(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Price(value)
    }

    /// Converts from a float, `None` for NaN or infinities
    pub fn from_f64(value: f64) -> Option<Self> {
        Decimal::from_f64(value).map(Price)
    }

    pub fn from_i64(value: i64) -> Self {
        Price(Decimal::from(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }

    pub fn clear(&mut self) {
        self.0 = Decimal::ZERO;
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Midpoint of two strictly positive prices, cleared otherwise
    pub fn mid(bid: Price, ask: Price) -> Price {
        if bid.is_positive() && ask.is_positive() {
            Price((bid.0 + ask.0) / Decimal::TWO)
        } else {
            Price::ZERO
        }
    }
}

impl From<Decimal> for Price {
    fn from(value: Decimal) -> Self {
        Price(value)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
