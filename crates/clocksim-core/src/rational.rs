//! Exact rational arithmetic for rates and progress accumulators.
//!
//! Tick rates are usually non-terminating decimals (a 1 s recipe at crafting
//! speed 0.9 takes 200/3 ticks), so every value that feeds a per-tick
//! accumulator is an arbitrary-precision [`Ratio`]. Conversions to
//! [`Fixed64`] and `f64` exist for reporting only, never for the sim loop.

use fixed::types::I32F32;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};

/// Reduced fraction of two arbitrary-precision integers.
pub type Ratio = BigRational;

/// Q32.32 fixed-point, used when a rational has to be reported compactly.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// 60 ticks make one simulated second.
pub const TICKS_PER_SECOND: u64 = 60;

/// Build `numer / denom`.
///
/// # Panics
/// Panics if `denom` is zero. Intended for constants and tests.
pub fn ratio(numer: i64, denom: i64) -> Ratio {
    Ratio::new(BigInt::from(numer), BigInt::from(denom))
}

/// Build a whole-number rational.
pub fn int(value: u64) -> Ratio {
    Ratio::from_integer(BigInt::from(value))
}

/// Exact zero.
pub fn zero() -> Ratio {
    Ratio::zero()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseRatioError {
    #[error("empty numeric literal")]
    Empty,
    #[error("invalid numeric literal: {0}")]
    Invalid(String),
    #[error("zero denominator in {0}")]
    ZeroDenominator(String),
    #[error("non-finite value: {0}")]
    NonFinite(String),
}

/// Parse a decimal (`"0.9"`, `"-1.25"`, `"3e-2"`) or fraction (`"200/3"`)
/// literal into an exact rational. `"0.9"` becomes exactly `9/10`.
pub fn parse_decimal(text: &str) -> Result<Ratio, ParseRatioError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseRatioError::Empty);
    }

    if let Some((numer, denom)) = text.split_once('/') {
        let numer = parse_decimal(numer)?;
        let denom = parse_decimal(denom)?;
        if denom.is_zero() {
            return Err(ParseRatioError::ZeroDenominator(text.to_string()));
        }
        return Ok(numer / denom);
    }

    let invalid = || ParseRatioError::Invalid(text.to_string());

    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (mantissa, exponent) = match body.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<i32>().map_err(|_| invalid())?),
        None => (body, 0),
    };
    let (whole, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let digits: BigInt = format!("{whole}{frac}").parse().map_err(|_| invalid())?;
    let frac_len = i32::try_from(frac.len()).map_err(|_| invalid())?;
    let scale = exponent.checked_sub(frac_len).ok_or_else(invalid)?;
    let ten = BigInt::from(10u32);
    let value = if scale >= 0 {
        Ratio::from_integer(digits * ten.pow(scale.unsigned_abs()))
    } else {
        Ratio::new(digits, ten.pow(scale.unsigned_abs()))
    };

    Ok(if negative { -value } else { value })
}

/// Convert a float to the rational its shortest decimal form denotes.
///
/// `0.9_f64` becomes `9/10`, not the binary value nearest to it. Use only
/// when reading metadata; the sim loop never sees floats.
pub fn from_f64_decimal(value: f64) -> Result<Ratio, ParseRatioError> {
    if !value.is_finite() {
        return Err(ParseRatioError::NonFinite(value.to_string()));
    }
    parse_decimal(&value.to_string())
}

/// Split a rational into its floor and the non-negative remainder.
///
/// The floor is taken on the exact value, so `2999999/1000000` yields 2 and
/// `3/1` yields 3 with no rounding at integer boundaries.
pub fn split_whole(value: &Ratio) -> (BigInt, Ratio) {
    let floor = value.floor();
    let remainder = value - &floor;
    (floor.to_integer(), remainder)
}

/// Convert a whole-number count to `u64`, if it fits.
pub fn whole_to_u64(value: &BigInt) -> Option<u64> {
    value.to_u64()
}

/// Floor of a rational as `u64`. Negative or oversized values yield `None`.
pub fn floor_u64(value: &Ratio) -> Option<u64> {
    value.floor().to_integer().to_u64()
}

/// Lossy conversion for display.
pub fn to_f64(value: &Ratio) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// Lossy conversion to Q32.32, truncating toward negative infinity and
/// saturating at the representable range.
pub fn to_fixed64(value: &Ratio) -> Fixed64 {
    let scaled = (value * int(1u64 << 32)).floor().to_integer();
    match scaled.to_i64() {
        Some(bits) => Fixed64::from_bits(bits),
        None if value.is_negative() => Fixed64::MIN,
        None => Fixed64::MAX,
    }
}
