//! Decimal-safe USD amounts.
//!
//! Binary floats lose precision on repeated addition/multiplication of money;
//! this type instead stores an integer number of picodollars (1e-12 USD),
//! matching the "fixed-point USD with >=6 decimal precision... rounded
//! half-even to 12 decimals" requirement for pricing math. `f64` is only used
//! at the edges: parsing a human-written price from a config file, and
//! serializing the final cost for an external API response.

use serde::{Deserialize, Serialize};
use std::fmt;

const SCALE: i128 = 1_000_000_000_000; // 1e12, picodollars per dollar

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Money {
    picodollars: i128,
}

impl Money {
    pub const ZERO: Money = Money { picodollars: 0 };

    pub fn from_picodollars(picodollars: i128) -> Self {
        Self { picodollars }
    }

    /// Parse a decimal USD literal such as `"0.15"` from a pricing config.
    pub fn from_decimal_str(s: &str) -> Result<Self, String> {
        let s = s.trim();
        let negative = s.starts_with('-');
        let digits = s.trim_start_matches('-');
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(format!("invalid decimal literal: '{s}'"));
        }
        let int_val: i128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| format!("invalid decimal literal: '{s}'"))?
        };
        if frac_part.len() > 12 {
            return Err(format!(
                "decimal literal '{s}' exceeds 12 decimal places of precision"
            ));
        }
        let mut frac_digits = frac_part.to_string();
        while frac_digits.len() < 12 {
            frac_digits.push('0');
        }
        let frac_val: i128 = if frac_digits.is_empty() {
            0
        } else {
            frac_digits
                .parse()
                .map_err(|_| format!("invalid decimal literal: '{s}'"))?
        };
        let mut picodollars = int_val * SCALE + frac_val;
        if negative {
            picodollars = -picodollars;
        }
        Ok(Self { picodollars })
    }

    pub fn from_f64(v: f64) -> Self {
        Self {
            picodollars: (v * SCALE as f64).round() as i128,
        }
    }

    pub fn as_f64(&self) -> f64 {
        self.picodollars as f64 / SCALE as f64
    }

    pub fn is_negative(&self) -> bool {
        self.picodollars < 0
    }

    pub fn is_zero(&self) -> bool {
        self.picodollars == 0
    }

    /// `self * numerator / denominator`, rounded half-to-even at the
    /// picodollar boundary. Used for `tokens / 1_000_000 * price_per_mtok`.
    pub fn mul_div_round(&self, numerator: i128, denominator: i128) -> Self {
        debug_assert!(denominator > 0);
        let product = self.picodollars * numerator;
        Self {
            picodollars: div_round_half_even(product, denominator),
        }
    }

    /// Multiply by a bounded rate (e.g. the global pricing multiplier),
    /// rounded half-to-even.
    pub fn mul_rate_round(&self, rate: f64) -> Self {
        let rate_scaled = (rate * SCALE as f64).round() as i128;
        Self {
            picodollars: div_round_half_even(self.picodollars * rate_scaled, SCALE),
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money {
            picodollars: self.picodollars + rhs.picodollars,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.12}", self.as_f64())
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v = f64::deserialize(deserializer)?;
        Ok(Money::from_f64(v))
    }
}

/// Round `numerator / denominator` half-to-even (banker's rounding), the
/// usual rule for financial arithmetic to avoid systematic upward bias.
fn div_round_half_even(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder == 0 {
        return quotient;
    }
    let twice_remainder = remainder.abs() * 2;
    let denom_abs = denominator.abs();
    let round_up = if twice_remainder > denom_abs {
        true
    } else if twice_remainder < denom_abs {
        false
    } else {
        quotient % 2 != 0
    };
    if round_up {
        quotient + numerator.signum() * denominator.signum()
    } else {
        quotient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_literal() {
        let m = Money::from_decimal_str("0.15").unwrap();
        assert!((m.as_f64() - 0.15).abs() < 1e-12);
    }

    #[test]
    fn scenario_1_cost_calculation() {
        // spec.md scenario 1: prompt 1000 @ 0.15/Mtok + completion 500 @ 0.6/Mtok
        let prompt_price = Money::from_decimal_str("0.15").unwrap();
        let completion_price = Money::from_decimal_str("0.6").unwrap();
        let cost = prompt_price.mul_div_round(1000, 1_000_000)
            + completion_price.mul_div_round(500, 1_000_000);
        assert!((cost.as_f64() - 0.00045).abs() < 1e-9);
    }

    #[test]
    fn multiplier_applies_last() {
        // spec.md scenario 2: native cost 1.23 * 1.10 = 1.353
        let native = Money::from_decimal_str("1.23").unwrap();
        let final_cost = native.mul_rate_round(1.10);
        assert!((final_cost.as_f64() - 1.353).abs() < 1e-9);
    }

    #[test]
    fn zero_price_is_zero_cost() {
        let zero = Money::ZERO;
        let cost = zero.mul_div_round(1000, 1_000_000);
        assert!(cost.is_zero());
    }

    #[test]
    fn half_even_rounding() {
        // 5 / 2 = 2.5 -> rounds to 2 (even), 7/2 = 3.5 -> rounds to 4 (even)
        assert_eq!(div_round_half_even(5, 2), 2);
        assert_eq!(div_round_half_even(7, 2), 4);
    }
}
