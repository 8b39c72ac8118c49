//! Radix constants: how many radix digits are packed into one element.

use serde::{Deserialize, Serialize};

use ntmul_ntt::MODULI;

use crate::error::EngineError;

/// Smallest radix supported.
pub const MIN_RADIX: u32 = 2;

/// Largest radix supported.
pub const MAX_RADIX: u32 = 36;

/// The smallest transform prime; every element base must stay below it.
pub const MIN_MODULUS: u64 = {
    let mut min = MODULI[0];
    let mut i = 1;
    while i < MODULI.len() {
        if MODULI[i] < min {
            min = MODULI[i];
        }
        i += 1;
    }
    min
};

/// Radix digits per element, indexed by radix (entries 0 and 1 are unused).
pub const BASE_DIGITS: [u32; 37] = {
    let mut table = [0u32; 37];
    let mut radix = 2;
    while radix <= 36 {
        let mut digits = 0;
        let mut power = 1u64;
        while power <= (MIN_MODULUS - 1) / radix {
            power *= radix;
            digits += 1;
        }
        table[radix as usize] = digits;
        radix += 1;
    }
    table
};

/// Element base `radix^BASE_DIGITS[radix]`, indexed by radix.
pub const BASE: [u64; 37] = {
    let mut table = [0u64; 37];
    let mut radix = 2;
    while radix <= 36 {
        let mut base = 1u64;
        let mut i = 0;
        while i < BASE_DIGITS[radix] {
            base *= radix as u64;
            i += 1;
        }
        table[radix] = base;
        radix += 1;
    }
    table
};

/// Element base for a radix and the number of radix digits each element holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadixConstants {
    /// The radix.
    pub radix: u32,
    /// Radix digits per element.
    pub digits_per_element: u32,
    /// `radix^digits_per_element`.
    pub base: u64,
}

impl RadixConstants {
    /// Constants for `radix` (2 to 36).
    pub fn new(radix: u32) -> Result<Self, EngineError> {
        if !(MIN_RADIX..=MAX_RADIX).contains(&radix) {
            return Err(EngineError::configuration(format!(
                "radix {radix} is outside {MIN_RADIX}..={MAX_RADIX}"
            )));
        }
        Ok(Self {
            radix,
            digits_per_element: BASE_DIGITS[radix as usize],
            base: BASE[radix as usize],
        })
    }

    /// Number of elements needed for `digits` radix digits.
    #[must_use]
    pub fn elements_for_digits(&self, digits: usize) -> usize {
        digits.div_ceil(self.digits_per_element as usize)
    }
}

/// Check that `base` can be used as an element base.
pub fn check_base(base: u64) -> Result<u64, EngineError> {
    if base < 2 || base >= MIN_MODULUS {
        return Err(EngineError::configuration(format!(
            "base {base} must be at least 2 and below {MIN_MODULUS}"
        )));
    }
    Ok(base)
}
