//! Fixed-scale exact decimal arithmetic for price and quantity values.
//!
//! `Decimal` is an `i128`-backed, fixed-precision signed decimal. Every
//! price and quantity on the matching hot path is a `Decimal`; binary
//! floating point never appears in the book, the matcher, or the journal.
//! Decimal strings only cross the wire boundary (command/event payloads).

use serde::{Deserialize, Serialize, de};
use std::cmp::Ordering;
use std::fmt;

/// Errors produced by decimal arithmetic and parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecimalError {
    /// A checked arithmetic operation (add/sub/mul/rescale) would overflow
    /// the `i128` backing integer.
    Overflow,
    /// The input string is not a well-formed canonical decimal
    /// (`-?[0-9]+(\.[0-9]+)?`).
    InvalidLiteral {
        /// The offending literal.
        literal: String,
    },
    /// A value could not be rescaled to the requested number of fractional
    /// digits without losing precision (rescaling to a *smaller* scale is
    /// always exact-truncating for this engine's purposes when the dropped
    /// digits are zero; otherwise this error is returned).
    PrecisionLoss {
        /// Scale the value was at.
        from_scale: u8,
        /// Scale that was requested.
        to_scale: u8,
    },
}

impl fmt::Display for DecimalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecimalError::Overflow => write!(f, "decimal arithmetic overflow"),
            DecimalError::InvalidLiteral { literal } => {
                write!(f, "invalid decimal literal: {literal:?}")
            }
            DecimalError::PrecisionLoss {
                from_scale,
                to_scale,
            } => write!(
                f,
                "rescaling from scale {from_scale} to {to_scale} would lose precision"
            ),
        }
    }
}

impl std::error::Error for DecimalError {}

/// A fixed-scale signed decimal: `units * 10^-scale`.
///
/// Two `Decimal`s are only directly comparable bit-for-bit when they share
/// a `scale`; [`Decimal::cmp_checked`] rescales before comparing when they
/// don't. Within the engine every price/quantity for a given pair is kept
/// at that pair's configured scale, so the common case never needs
/// rescaling.
#[derive(Debug, Clone, Copy, Eq)]
pub struct Decimal {
    units: i128,
    scale: u8,
}

const POW10: [i128; 19] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
    100_000_000_000,
    1_000_000_000_000,
    10_000_000_000_000,
    100_000_000_000_000,
    1_000_000_000_000_000,
    10_000_000_000_000_000,
    100_000_000_000_000_000,
    1_000_000_000_000_000_000,
];

fn pow10(exp: u8) -> Result<i128, DecimalError> {
    POW10.get(exp as usize).copied().ok_or(DecimalError::Overflow)
}

impl Decimal {
    /// Construct a decimal from raw scaled units: value = `units * 10^-scale`.
    pub fn from_units(units: i128, scale: u8) -> Self {
        Self { units, scale }
    }

    /// The zero value at the given scale.
    pub fn zero(scale: u8) -> Self {
        Self { units: 0, scale }
    }

    /// `true` if the value is exactly zero (regardless of scale).
    pub fn is_zero(&self) -> bool {
        self.units == 0
    }

    /// `true` if the value is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.units > 0
    }

    /// The configured number of fractional digits.
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// The raw scaled integer (`value * 10^scale`).
    pub fn units(&self) -> i128 {
        self.units
    }

    /// Rescale to `target_scale`. Widening (more fractional digits) is
    /// always exact. Narrowing is exact only if the dropped digits are
    /// zero; otherwise [`DecimalError::PrecisionLoss`] is returned — this
    /// engine never silently truncates money.
    pub fn rescale(&self, target_scale: u8) -> Result<Decimal, DecimalError> {
        if target_scale == self.scale {
            return Ok(*self);
        }
        if target_scale > self.scale {
            let factor = pow10(target_scale - self.scale)?;
            let units = self
                .units
                .checked_mul(factor)
                .ok_or(DecimalError::Overflow)?;
            Ok(Decimal {
                units,
                scale: target_scale,
            })
        } else {
            let factor = pow10(self.scale - target_scale)?;
            if self.units % factor != 0 {
                return Err(DecimalError::PrecisionLoss {
                    from_scale: self.scale,
                    to_scale: target_scale,
                });
            }
            Ok(Decimal {
                units: self.units / factor,
                scale: target_scale,
            })
        }
    }

    fn common_scale(a: Decimal, b: Decimal) -> Result<(i128, i128, u8), DecimalError> {
        if a.scale == b.scale {
            return Ok((a.units, b.units, a.scale));
        }
        let target = a.scale.max(b.scale);
        let a = a.rescale(target)?;
        let b = b.rescale(target)?;
        Ok((a.units, b.units, target))
    }

    /// Checked addition; operands may differ in scale, result takes the
    /// larger of the two.
    pub fn checked_add(&self, other: &Decimal) -> Result<Decimal, DecimalError> {
        let (a, b, scale) = Self::common_scale(*self, *other)?;
        let units = a.checked_add(b).ok_or(DecimalError::Overflow)?;
        Ok(Decimal { units, scale })
    }

    /// Checked subtraction; operands may differ in scale, result takes the
    /// larger of the two.
    pub fn checked_sub(&self, other: &Decimal) -> Result<Decimal, DecimalError> {
        let (a, b, scale) = Self::common_scale(*self, *other)?;
        let units = a.checked_sub(b).ok_or(DecimalError::Overflow)?;
        Ok(Decimal { units, scale })
    }

    /// Multiply two decimals, truncating the raw product to `result_scale`
    /// fractional digits. This is the hot-path operation for notional
    /// (`price * qty`): the mathematical product of two scaled decimals has
    /// `self.scale + other.scale` fractional digits, which is truncated
    /// down to `result_scale` (discarding remainder, never rounding up).
    pub fn checked_mul_truncated(
        &self,
        other: &Decimal,
        result_scale: u8,
    ) -> Result<Decimal, DecimalError> {
        let product = self
            .units
            .checked_mul(other.units)
            .ok_or(DecimalError::Overflow)?;
        let product_scale = self
            .scale
            .checked_add(other.scale)
            .ok_or(DecimalError::Overflow)?;
        if result_scale >= product_scale {
            let factor = pow10(result_scale - product_scale)?;
            let units = product.checked_mul(factor).ok_or(DecimalError::Overflow)?;
            Ok(Decimal {
                units,
                scale: result_scale,
            })
        } else {
            let factor = pow10(product_scale - result_scale)?;
            Ok(Decimal {
                units: product / factor,
                scale: result_scale,
            })
        }
    }

    /// The smaller of `a` and `b` (rescaling as needed for comparison; the
    /// returned value keeps its own original scale).
    pub fn min(a: Decimal, b: Decimal) -> Decimal {
        if a.cmp_checked(&b).unwrap_or(Ordering::Greater) == Ordering::Greater {
            b
        } else {
            a
        }
    }

    /// Compare two decimals regardless of scale, rescaling to the larger
    /// scale first. Returns `Err` only on overflow while rescaling.
    pub fn cmp_checked(&self, other: &Decimal) -> Result<Ordering, DecimalError> {
        let (a, b, _) = Self::common_scale(*self, *other)?;
        Ok(a.cmp(&b))
    }

    /// Parse a canonical decimal literal (`-?[0-9]+(\.[0-9]+)?`), inferring
    /// the scale from the number of digits after the decimal point.
    pub fn parse_str(literal: &str) -> Result<Decimal, DecimalError> {
        let invalid = || DecimalError::InvalidLiteral {
            literal: literal.to_string(),
        };

        let (sign, rest) = match literal.strip_prefix('-') {
            Some(rest) => (-1i128, rest),
            None => (1i128, literal),
        };
        if rest.is_empty() {
            return Err(invalid());
        }

        let (int_part, frac_part) = match rest.split_once('.') {
            Some((i, f)) => (i, f),
            None => (rest, ""),
        };

        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if rest.contains('.') && frac_part.is_empty() {
            return Err(invalid());
        }

        let scale: u8 = frac_part.len().try_into().map_err(|_| invalid())?;
        if scale as usize >= POW10.len() {
            return Err(DecimalError::Overflow);
        }
        let digits = format!("{int_part}{frac_part}");
        let magnitude: i128 = digits.parse().map_err(|_| invalid())?;

        Ok(Decimal {
            units: sign
                .checked_mul(magnitude)
                .ok_or(DecimalError::Overflow)?,
            scale,
        })
    }

    /// Parse a literal and rescale it to exactly `scale` fractional digits
    /// (used on the acceptance path once a pair's configured scale is
    /// known). Fails with [`DecimalError::PrecisionLoss`] if the literal
    /// carries more precision than `scale` allows.
    pub fn parse_with_scale(literal: &str, scale: u8) -> Result<Decimal, DecimalError> {
        Self::parse_str(literal)?.rescale(scale)
    }

    /// Render the canonical string form: no leading zeros (besides a
    /// single `0` before the point), no trailing zeros beyond `scale`,
    /// always showing exactly `scale` fractional digits.
    pub fn to_canonical_string(&self) -> String {
        let negative = self.units < 0;
        let magnitude = self.units.unsigned_abs();
        if self.scale == 0 {
            return if negative {
                format!("-{magnitude}")
            } else {
                magnitude.to_string()
            };
        }
        let divisor = POW10[self.scale as usize] as u128;
        let int_part = magnitude / divisor;
        let frac_part = magnitude % divisor;
        let sign = if negative { "-" } else { "" };
        format!(
            "{sign}{int_part}.{frac_part:0width$}",
            width = self.scale as usize
        )
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_checked(other) == Ok(Ordering::Equal)
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    /// Orders by mathematical value. Same-scale comparisons (the hot-path
    /// case within a single pair) never overflow; cross-scale comparisons
    /// that would overflow during rescaling fall back to comparing scales,
    /// which cannot happen for values the engine itself produces.
    fn cmp(&self, other: &Self) -> Ordering {
        if self.scale == other.scale {
            self.units.cmp(&other.units)
        } else {
            self.cmp_checked(other)
                .unwrap_or_else(|_| self.scale.cmp(&other.scale))
        }
    }
}

impl std::hash::Hash for Decimal {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.units.hash(state);
        self.scale.hash(state);
    }
}

impl Serialize for Decimal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_canonical_string())
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Decimal::parse_str(&s).map_err(de::Error::custom)
    }
}
