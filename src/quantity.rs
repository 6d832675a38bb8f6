//! Exact resource quantities.
//!
//! Cluster quantities are scaled decimals ("500m", "4096Mi", "1.5", "2e3").
//! [`Quantity`] keeps them as a [`Decimal`] so that adding and subtracting
//! limits never drifts the way floating point would.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity as KubeQuantity;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Finest precision the API server keeps (nano-units).
const MAX_SCALE: u32 = 9;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,
    #[error("invalid quantity \"{0}\"")]
    Invalid(String),
    #[error("unknown suffix \"{suffix}\" in quantity \"{raw}\"")]
    UnknownSuffix { raw: String, suffix: String },
    #[error("quantity \"{0}\" is out of range")]
    OutOfRange(String),
}

/// A signed resource amount with nano-unit precision.
///
/// Values finer than one nano-unit are rounded up when parsed, the same way
/// the API server canonicalises them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(Decimal);

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);

    pub fn from_nanos(nanos: i64) -> Self {
        Self(Decimal::new(nanos, 9))
    }

    pub fn from_millis(millis: i64) -> Self {
        Self(Decimal::new(millis, 3))
    }

    pub fn from_units(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Value in thousandths of a unit, rounded away from zero.
    pub fn milli_value(&self) -> i64 {
        let millis = self
            .0
            .checked_mul(Decimal::ONE_THOUSAND)
            .unwrap_or(if self.0.is_sign_negative() { Decimal::MIN } else { Decimal::MAX });
        round_up(millis)
    }

    /// Value in whole units, rounded away from zero.
    pub fn value(&self) -> i64 {
        round_up(self.0)
    }
}

fn round_up(value: Decimal) -> i64 {
    let rounded = value.round_dp_with_strategy(0, RoundingStrategy::AwayFromZero);
    rounded
        .to_i64()
        .unwrap_or(if rounded.is_sign_negative() { i64::MIN } else { i64::MAX })
}

enum Scale {
    Binary(u32),
    Decimal(i32),
}

impl Scale {
    fn parse(suffix: &str) -> Option<Scale> {
        let scale = match suffix {
            "" => Scale::Decimal(0),
            "Ki" => Scale::Binary(1),
            "Mi" => Scale::Binary(2),
            "Gi" => Scale::Binary(3),
            "Ti" => Scale::Binary(4),
            "Pi" => Scale::Binary(5),
            "Ei" => Scale::Binary(6),
            "n" => Scale::Decimal(-9),
            "u" => Scale::Decimal(-6),
            "m" => Scale::Decimal(-3),
            "k" => Scale::Decimal(3),
            "M" => Scale::Decimal(6),
            "G" => Scale::Decimal(9),
            "T" => Scale::Decimal(12),
            "P" => Scale::Decimal(15),
            "E" => Scale::Decimal(18),
            _ => {
                let exponent = suffix
                    .strip_prefix('e')
                    .or_else(|| suffix.strip_prefix('E'))?;
                return exponent.parse().ok().map(Scale::Decimal);
            }
        };
        Some(scale)
    }

    fn multiplier(&self) -> Option<Decimal> {
        match *self {
            Scale::Binary(power) => 1024i64.checked_pow(power).map(Decimal::from),
            Scale::Decimal(exponent) if exponent >= 0 => 10i128
                .checked_pow(exponent.unsigned_abs())
                .and_then(|m| Decimal::try_from_i128_with_scale(m, 0).ok()),
            Scale::Decimal(exponent) => {
                Decimal::try_from_i128_with_scale(1, exponent.unsigned_abs()).ok()
            }
        }
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(QuantityError::Empty);
        }
        let out_of_range = || QuantityError::OutOfRange(raw.to_string());

        let (negative, unsigned) = if let Some(rest) = raw.strip_prefix('-') {
            (true, rest)
        } else {
            (false, raw.strip_prefix('+').unwrap_or(raw))
        };

        let number_end = unsigned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(number_end);
        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if (int_part.is_empty() && frac_part.is_empty()) || frac_part.contains('.') {
            return Err(QuantityError::Invalid(raw.to_string()));
        }

        let scale = Scale::parse(suffix).ok_or_else(|| QuantityError::UnknownSuffix {
            raw: raw.to_string(),
            suffix: suffix.to_string(),
        })?;

        let int_part = if int_part.is_empty() { "0" } else { int_part };
        let mantissa = if frac_part.is_empty() {
            Decimal::from_str_exact(int_part)
        } else {
            Decimal::from_str_exact(&format!("{int_part}.{frac_part}"))
        }
        .map_err(|_| out_of_range())?;

        let mut value = scale
            .multiplier()
            .and_then(|m| mantissa.checked_mul(m))
            .ok_or_else(out_of_range)?;
        if value.scale() > MAX_SCALE {
            value = value.round_dp_with_strategy(MAX_SCALE, RoundingStrategy::AwayFromZero);
        }

        Ok(Quantity(if negative { -value } else { value }))
    }
}

impl TryFrom<&KubeQuantity> for Quantity {
    type Error = QuantityError;

    fn try_from(q: &KubeQuantity) -> Result<Self, Self::Error> {
        q.0.parse()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = self.0;
        if units.fract().is_zero() {
            return write!(f, "{}", units.trunc().normalize());
        }
        let millis = units.saturating_mul(Decimal::ONE_THOUSAND);
        if millis.fract().is_zero() {
            return write!(f, "{}m", millis.trunc().normalize());
        }
        let nanos = units.saturating_mul(Decimal::from(1_000_000_000i64));
        write!(f, "{}n", nanos.trunc().normalize())
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Quantity(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        *self = *self + rhs;
    }
}

impl Sub for Quantity {
    type Output = Quantity;

    fn sub(self, rhs: Quantity) -> Quantity {
        Quantity(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Quantity {
    fn sub_assign(&mut self, rhs: Quantity) {
        *self = *self - rhs;
    }
}

impl Neg for Quantity {
    type Output = Quantity;

    fn neg(self) -> Quantity {
        Quantity(-self.0)
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Quantity {
        iter.fold(Quantity::ZERO, Add::add)
    }
}
