// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::{LotError, LotResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Largest magnitude accepted from a binary float constructor. Above this
/// an f64 cannot represent every integer, so the conversion is not exact.
const MAX_SAFE_F64: f64 = 9_007_199_254_740_992.0; // 2^53

/// Exact monetary amount. Wraps a full-precision decimal; arithmetic never
/// rounds. Precision is reduced in exactly two places: [`Money::format_pesos`]
/// and [`Money::to_stored`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Parse an exact decimal string. This is the required construction
    /// path for configuration values and operator input.
    pub fn parse(s: &str) -> LotResult<Money> {
        let d = Decimal::from_str_exact(s.trim())
            .map_err(|_| LotError::Validation(format!("invalid amount '{}'", s)))?;
        Ok(Money(d))
    }

    /// Accept a binary float only when it is finite and within the range
    /// where f64 is exact over integers. Callers that need exact cents
    /// should use [`Money::parse`] instead.
    pub fn from_f64(v: f64) -> LotResult<Money> {
        if !v.is_finite() || v.abs() > MAX_SAFE_F64 {
            return Err(LotError::Validation(format!(
                "amount {} is outside the safe float range",
                v
            )));
        }
        let d = Decimal::try_from(v)
            .map_err(|_| LotError::Validation(format!("amount {} is not representable", v)))?;
        Ok(Money(d))
    }

    pub fn add(self, other: Money) -> Money {
        Money(self.0 + other.0)
    }

    pub fn subtract(self, other: Money) -> Money {
        Money(self.0 - other.0)
    }

    /// Scale by an integer count of periods/months. The primary scaling
    /// operation; division is deliberately absent from this API.
    pub fn times(self, n: u32) -> Money {
        Money(self.0 * Decimal::from(n))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Number of decimal places carried by the value.
    pub fn scale(&self) -> u32 {
        self.0.normalize().scale()
    }

    pub fn inner(&self) -> Decimal {
        self.0
    }

    /// HALF_UP to two places. The display/storage precision boundary.
    fn rounded(&self) -> Decimal {
        self.0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Canonical 2-dp storage form for monetary DB columns.
    pub fn to_stored(&self) -> String {
        format!("{:.2}", self.rounded())
    }

    /// Render with locale grouping, e.g. `$1,234.50`. The formatting
    /// context is an explicit argument; there is no process-wide locale.
    pub fn format_pesos(&self, fmt: &PesoFormat) -> String {
        let rounded = self.rounded();
        let negative = rounded.is_sign_negative();
        let s = format!("{:.2}", rounded.abs());
        let (int_part, frac_part) = s.split_once('.').unwrap_or((s.as_str(), "00"));

        let mut grouped = String::new();
        let digits: Vec<char> = int_part.chars().collect();
        for (i, ch) in digits.iter().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(fmt.thousands);
            }
            grouped.push(*ch);
        }

        let sign = if negative { "-" } else { "" };
        format!(
            "{}{}{}{}{}",
            sign, fmt.symbol, grouped, fmt.decimal, frac_part
        )
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.rounded())
    }
}

/// Formatting context for peso display.
#[derive(Debug, Clone)]
pub struct PesoFormat {
    pub symbol: &'static str,
    pub thousands: char,
    pub decimal: char,
}

impl Default for PesoFormat {
    fn default() -> Self {
        PesoFormat {
            symbol: "$",
            thousands: ',',
            decimal: '.',
        }
    }
}

/// MXN cash denominations, largest first.
const DENOMINATIONS: [&str; 11] = [
    "1000", "500", "200", "100", "50", "20", "10", "5", "2", "1", "0.50",
];

/// Greedy split of a non-negative amount into cash denominations. Any
/// residue smaller than the smallest coin is returned as-is so nothing is
/// silently dropped.
pub fn break_into_denominations(amount: Money) -> Vec<(Money, u32)> {
    let mut out = Vec::new();
    if amount.is_negative() || amount.is_zero() {
        return out;
    }
    let mut rest = amount.inner();
    for denom in DENOMINATIONS {
        let d = Decimal::from_str_exact(denom).unwrap();
        if rest < d {
            continue;
        }
        let count = (rest / d).floor();
        if let Some(n) = count.to_u32() {
            if n > 0 {
                rest -= d * count;
                out.push((Money(d), n));
            }
        }
    }
    if !rest.is_zero() {
        out.push((Money(rest), 1));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouping_and_rounding() {
        let fmt = PesoFormat::default();
        let m = Money::parse("1234567.895").unwrap();
        assert_eq!(m.format_pesos(&fmt), "$1,234,567.90");
        assert_eq!(Money::parse("-45.5").unwrap().format_pesos(&fmt), "-$45.50");
        assert_eq!(Money::ZERO.format_pesos(&fmt), "$0.00");
    }

    #[test]
    fn unsafe_float_rejected() {
        assert!(Money::from_f64(f64::NAN).is_err());
        assert!(Money::from_f64(9.1e15).is_err());
        assert!(Money::from_f64(125.0).is_ok());
    }

    #[test]
    fn denominations_cover_change() {
        let split = break_into_denominations(Money::parse("387.50").unwrap());
        let total = split
            .iter()
            .fold(Money::ZERO, |acc, (d, n)| acc.add(d.times(*n)));
        assert_eq!(total, Money::parse("387.50").unwrap());
        assert_eq!(split[0], (Money::parse("200").unwrap(), 1));
    }
}
