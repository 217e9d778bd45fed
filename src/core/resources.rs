//! Resource quantities and placeholder ask aggregation.
//!
//! Quantities follow the orchestration platform's grammar (`500m`, `1.5`,
//! `500Mi`, `2G`, `1e3`). They are held as an exact decimal fraction so that
//! conversion into scheduler units can round up without float error.
//!
//! A task group's contribution to the placeholder ask is computed per
//! dimension by rounding the per-member value up to the dimension's unit
//! first and multiplying by the member count second:
//!
//! | pod resource | scheduler name | unit |
//! |---|---|---|
//! | `cpu` | `vcore` | milli-cpu |
//! | `memory` | `memory` | 10^6 bytes |
//! | anything else | unchanged | whole units |
//!
//! `500Mi` is 524 288 000 bytes, which rounds up to 525 memory units; ten
//! members therefore ask for 5 250, not `ceil(10 × 524.288) = 5 243`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::ShimError;

/// Scheduler-side name of the cpu dimension.
pub const CPU: &str = "vcore";
/// Scheduler-side name of the memory dimension.
pub const MEMORY: &str = "memory";
/// Pod-side name of the cpu dimension.
pub const POD_CPU: &str = "cpu";
/// Pod-side name of the memory dimension.
pub const POD_MEMORY: &str = "memory";

/// Decimal exponent of the memory unit (10^6 bytes).
const MEMORY_SCALE: i32 = 6;
/// Decimal exponent of the cpu unit (milli).
const CPU_SCALE: i32 = -3;

/// Parsed resource quantity, stored as `numerator / 10^denominator_exp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quantity {
    raw: String,
    numerator: i128,
    denominator_exp: u32,
}

impl Quantity {
    /// Value rounded up to a multiple of `10^scale`, expressed in those units.
    #[must_use]
    pub fn scaled_value(&self, scale: i32) -> i64 {
        let shift = i64::from(self.denominator_exp) + i64::from(scale);
        let scaled = if shift >= 0 {
            match u32::try_from(shift).ok().and_then(|s| 10_i128.checked_pow(s)) {
                Some(divisor) => ceil_div(self.numerator, divisor),
                // divisor exceeds any representable numerator
                None => i128::from(self.numerator > 0),
            }
        } else {
            u32::try_from(-shift)
                .ok()
                .and_then(|s| 10_i128.checked_pow(s))
                .map_or(i128::MAX, |m| self.numerator.saturating_mul(m))
        };
        clamp_i64(scaled)
    }

    /// Value in milli-units, rounded up.
    #[must_use]
    pub fn milli_value(&self) -> i64 {
        self.scaled_value(CPU_SCALE)
    }

    /// Value in whole units, rounded up.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.scaled_value(0)
    }

    /// The original text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn ceil_div(a: i128, b: i128) -> i128 {
    let q = a.div_euclid(b);
    if a.rem_euclid(b) == 0 {
        q
    } else {
        q + 1
    }
}

fn clamp_i64(v: i128) -> i64 {
    i64::try_from(v).unwrap_or(if v < 0 { i64::MIN } else { i64::MAX })
}

impl FromStr for Quantity {
    type Err = ShimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ShimError::InvalidQuantity(s.to_string());
        let trimmed = s.trim();
        let (negative, rest) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            Some(_) => (false, trimmed),
            None => return Err(invalid()),
        };

        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, suffix) = rest.split_at(number_end);
        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if frac_part.contains('.') || (int_part.is_empty() && frac_part.is_empty()) {
            return Err(invalid());
        }

        let digits = format!("{int_part}{frac_part}");
        let mut numerator: i128 = digits.parse().map_err(|_| invalid())?;
        let mut denominator_exp = u32::try_from(frac_part.len()).map_err(|_| invalid())?;

        let mut multiply = |factor: i128| -> Result<(), ShimError> {
            numerator = numerator.checked_mul(factor).ok_or_else(invalid)?;
            Ok(())
        };
        match suffix {
            "" => {}
            "Ki" => multiply(1 << 10)?,
            "Mi" => multiply(1 << 20)?,
            "Gi" => multiply(1 << 30)?,
            "Ti" => multiply(1 << 40)?,
            "Pi" => multiply(1 << 50)?,
            "Ei" => multiply(1 << 60)?,
            "n" => denominator_exp += 9,
            "u" => denominator_exp += 6,
            "m" => denominator_exp += 3,
            "k" => multiply(10_i128.pow(3))?,
            "M" => multiply(10_i128.pow(6))?,
            "G" => multiply(10_i128.pow(9))?,
            "T" => multiply(10_i128.pow(12))?,
            "P" => multiply(10_i128.pow(15))?,
            "E" => multiply(10_i128.pow(18))?,
            exp if exp.len() > 1 && (exp.starts_with('e') || exp.starts_with('E')) => {
                let power: i32 = exp[1..].parse().map_err(|_| invalid())?;
                let magnitude = power.unsigned_abs();
                if power >= 0 {
                    multiply(10_i128.checked_pow(magnitude).ok_or_else(invalid)?)?;
                } else {
                    denominator_exp = denominator_exp.checked_add(magnitude).ok_or_else(invalid)?;
                }
            }
            _ => return Err(invalid()),
        }

        if negative {
            numerator = -numerator;
        }
        Ok(Self {
            raw: trimmed.to_string(),
            numerator,
            denominator_exp,
        })
    }
}

impl TryFrom<String> for Quantity {
    type Error = ShimError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Quantity> for String {
    fn from(q: Quantity) -> Self {
        q.raw
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Named resource amounts in scheduler units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    resources: BTreeMap<String, i64>,
}

impl Resource {
    /// Empty resource.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: add `value` to dimension `name`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: i64) -> Self {
        self.add_value(name, value);
        self
    }

    /// Add `value` to dimension `name`.
    pub fn add_value(&mut self, name: impl Into<String>, value: i64) {
        let entry = self.resources.entry(name.into()).or_insert(0);
        *entry = entry.saturating_add(value);
    }

    /// Amount for `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<i64> {
        self.resources.get(name).copied()
    }

    /// Dimension-wise sum.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        let mut sum = self.clone();
        for (name, value) in &other.resources {
            sum.add_value(name.clone(), *value);
        }
        sum
    }

    /// Iterate over `(name, amount)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.resources.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// True when no dimension is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Total ask of one task group: per-member minimum rounded per dimension,
/// then multiplied by `members`.
#[must_use]
pub fn task_group_resource(min_resource: &BTreeMap<String, Quantity>, members: u32) -> Resource {
    let members = i64::from(members);
    let mut result = Resource::new();
    for (name, quantity) in min_resource {
        match name.as_str() {
            POD_CPU => result.add_value(CPU, members.saturating_mul(quantity.milli_value())),
            POD_MEMORY => result.add_value(
                MEMORY,
                members.saturating_mul(quantity.scaled_value(MEMORY_SCALE)),
            ),
            other => result.add_value(other, members.saturating_mul(quantity.value())),
        }
    }
    result
}
