//! Conversion between digit sequences, number strings and `BigUint`.
//!
//! Element sequences are most significant first. A number string in radix `r`
//! is grouped from its least significant end into elements of
//! `digits_per_element` radix digits, so the first element may be partial.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{ToPrimitive, Zero};

use crate::error::EngineError;
use crate::radix::RadixConstants;

/// Parse a number string into elements of the radix base.
///
/// Underscores are skipped. An empty string parses to a single zero element.
pub fn parse_digits(s: &str, radix: &RadixConstants) -> Result<Vec<u64>, EngineError> {
    let mut digits = Vec::with_capacity(s.len());
    for (position, character) in s.trim().chars().enumerate() {
        if character == '_' {
            continue;
        }
        let digit = character.to_digit(radix.radix).ok_or(EngineError::InvalidNumber {
            position,
            character,
            radix: radix.radix,
        })?;
        digits.push(u64::from(digit));
    }
    if digits.is_empty() {
        return Ok(vec![0]);
    }

    let per_element = radix.digits_per_element as usize;
    let head = digits.len() % per_element;
    let mut elements = Vec::with_capacity(radix.elements_for_digits(digits.len()));
    if head > 0 {
        elements.push(fold_digits(&digits[..head], radix.radix));
    }
    elements.extend(
        digits[head..]
            .chunks(per_element)
            .map(|chunk| fold_digits(chunk, radix.radix)),
    );
    Ok(elements)
}

fn fold_digits(digits: &[u64], radix: u32) -> u64 {
    digits
        .iter()
        .fold(0, |acc, &d| acc * u64::from(radix) + d)
}

/// Render elements of the radix base as a number string without leading zeros.
pub fn format_digits(elements: &[u64], radix: &RadixConstants) -> Result<String, EngineError> {
    let width = radix.digits_per_element as usize;
    let mut out = String::with_capacity(elements.len() * width);
    for (position, &value) in elements.iter().enumerate() {
        if value >= radix.base {
            return Err(EngineError::InvalidDigit {
                position,
                value,
                base: radix.base,
            });
        }
        let text = BigUint::from(value).to_str_radix(radix.radix);
        if out.is_empty() {
            if value != 0 {
                out.push_str(&text);
            }
        } else {
            out.extend(std::iter::repeat('0').take(width - text.len()));
            out.push_str(&text);
        }
    }
    if out.is_empty() {
        out.push('0');
    }
    Ok(out)
}

/// The value of elements of the radix base.
pub fn to_biguint(elements: &[u64], radix: &RadixConstants) -> Result<BigUint, EngineError> {
    let text = format_digits(elements, radix)?;
    BigUint::parse_bytes(text.as_bytes(), radix.radix)
        .ok_or_else(|| EngineError::internal(format!("formatted number is not radix {}", radix.radix)))
}

/// `value` as elements of the radix base, with no leading zero elements.
pub fn from_biguint(value: &BigUint, radix: &RadixConstants) -> Result<Vec<u64>, EngineError> {
    parse_digits(&value.to_str_radix(radix.radix), radix)
}

/// The value of digits in an arbitrary `base`.
#[must_use]
pub fn to_biguint_base(digits: &[u64], base: u64) -> BigUint {
    digits
        .iter()
        .fold(BigUint::zero(), |acc, &d| acc * base + d)
}

/// `value` as exactly `len` digits of `base`.
pub fn from_biguint_base(value: &BigUint, base: u64, len: usize) -> Result<Vec<u64>, EngineError> {
    let divisor = BigUint::from(base);
    let mut rest = value.clone();
    let mut digits = vec![0; len];
    for d in digits.iter_mut().rev() {
        if rest.is_zero() {
            break;
        }
        let (quotient, remainder) = rest.div_rem(&divisor);
        *d = remainder
            .to_u64()
            .ok_or_else(|| EngineError::internal("remainder does not fit a digit"))?;
        rest = quotient;
    }
    if !rest.is_zero() {
        return Err(EngineError::configuration(format!(
            "value does not fit in {len} digits of base {base}"
        )));
    }
    Ok(digits)
}
