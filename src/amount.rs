use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Fractional digits carried by every [`Amount`]. Matches the 18-decimal
/// precision the exchange uses for on-chain style quantities.
pub const AMOUNT_SCALE: u32 = 18;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("invalid decimal literal: '{0}'")]
    Parse(String),
    #[error("division by zero")]
    DivisionByZero,
}

/// Immutable fixed-scale decimal used for all prices and sizes.
///
/// Arithmetic and comparisons are total; construction rounds deterministically
/// to [`AMOUNT_SCALE`] fractional digits. Values never carry NaN-like states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    fn fixed(mut inner: Decimal) -> Decimal {
        if inner.scale() > AMOUNT_SCALE {
            inner = inner
                .round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);
        }
        inner.rescale(AMOUNT_SCALE);
        inner
    }

    pub fn from_f64(value: f64) -> Result<Self, AmountError> {
        Decimal::from_f64(value)
            .map(|d| Amount(Self::fixed(d)))
            .ok_or_else(|| AmountError::Parse(value.to_string()))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn abs(self) -> Self {
        Amount(self.0.abs())
    }

    pub fn min(self, other: Self) -> Self {
        if self <= other {
            self
        } else {
            other
        }
    }

    /// Division is the only operation that can fail, so it is explicit.
    pub fn checked_div(self, rhs: Self) -> Result<Self, AmountError> {
        if rhs.0.is_zero() {
            return Err(AmountError::DivisionByZero);
        }
        Ok(Amount(Self::fixed(self.0 / rhs.0)))
    }

    /// Whole units, truncated toward zero. Contract sizes are sent to the
    /// exchange as integers.
    pub fn whole_units(&self) -> Option<i64> {
        self.0.trunc().to_i64()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(|d| Amount(Self::fixed(d)))
            .map_err(|_| AmountError::Parse(s.to_string()))
    }
}

impl TryFrom<String> for Amount {
    type Error = AmountError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Amount> for String {
    fn from(a: Amount) -> String {
        a.to_string()
    }
}

impl From<i64> for Amount {
    fn from(v: i64) -> Self {
        Amount(Self::fixed(Decimal::from(v)))
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Amount(Self::fixed(Decimal::from(v)))
    }
}

impl From<u32> for Amount {
    fn from(v: u32) -> Self {
        Amount(Self::fixed(Decimal::from(v)))
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(Self::fixed(self.0 + rhs.0))
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(Self::fixed(self.0 - rhs.0))
    }
}

impl Mul for Amount {
    type Output = Amount;

    fn mul(self, rhs: Amount) -> Amount {
        Amount(Self::fixed(self.0 * rhs.0))
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}
