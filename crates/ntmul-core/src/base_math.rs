//! Digit arithmetic in an arbitrary element base.
//!
//! Digit slices are most significant first. Every operation walks from the
//! least significant end and threads an explicit carry, borrow or remainder so
//! that long sequences can be processed in pieces.

use crate::error::EngineError;
use crate::radix::check_base;

/// Add with carry in `base`: `a + b + carry -> (digit, new_carry)`.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn add_with_carry(a: u64, b: u64, carry: u64, base: u64) -> (u64, u64) {
    let sum = u128::from(a) + u128::from(b) + u128::from(carry);
    let base = u128::from(base);
    ((sum % base) as u64, (sum / base) as u64)
}

/// Subtract with borrow in `base`: `a - b - borrow -> (digit, new_borrow)`.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn sub_with_borrow(a: u64, b: u64, borrow: u64, base: u64) -> (u64, u64) {
    let diff = i128::from(a) - i128::from(b) - i128::from(borrow);
    if diff < 0 {
        ((diff + i128::from(base)) as u64, 1)
    } else {
        (diff as u64, 0)
    }
}

/// Multiply-add in `base`: `a·b + c + carry -> (digit, new_carry)`.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn mul_add(a: u64, b: u64, c: u64, carry: u64, base: u64) -> (u64, u64) {
    let value = u128::from(a) * u128::from(b) + u128::from(c) + u128::from(carry);
    let base = u128::from(base);
    ((value % base) as u64, (value / base) as u64)
}

/// Digit arithmetic in one base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseMath {
    base: u64,
}

impl BaseMath {
    /// Arithmetic in `base`.
    pub fn new(base: u64) -> Result<Self, EngineError> {
        Ok(Self {
            base: check_base(base)?,
        })
    }

    /// The base.
    #[must_use]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// `dst = src1 + src2 + carry`, returning the carry out of the most
    /// significant digit. A missing `src2` counts as zero.
    pub fn add(
        &self,
        src1: &[u64],
        src2: Option<&[u64]>,
        carry: u64,
        dst: &mut [u64],
    ) -> Result<u64, EngineError> {
        check_lengths(src1.len(), src2.map(<[u64]>::len), dst.len())?;
        let mut carry = carry;
        for i in (0..dst.len()).rev() {
            let b = src2.map_or(0, |s| s[i]);
            (dst[i], carry) = add_with_carry(src1[i], b, carry, self.base);
        }
        Ok(carry)
    }

    /// `dst = src1 - src2 - borrow`, returning the borrow out of the most
    /// significant digit.
    pub fn subtract(
        &self,
        src1: &[u64],
        src2: Option<&[u64]>,
        borrow: u64,
        dst: &mut [u64],
    ) -> Result<u64, EngineError> {
        check_lengths(src1.len(), src2.map(<[u64]>::len), dst.len())?;
        let mut borrow = borrow;
        for i in (0..dst.len()).rev() {
            let b = src2.map_or(0, |s| s[i]);
            (dst[i], borrow) = sub_with_borrow(src1[i], b, borrow, self.base);
        }
        Ok(borrow)
    }

    /// `dst = src1·multiplier + src2 + carry`, returning the carry out of the
    /// most significant digit.
    pub fn multiply_add(
        &self,
        src1: &[u64],
        src2: Option<&[u64]>,
        multiplier: u64,
        carry: u64,
        dst: &mut [u64],
    ) -> Result<u64, EngineError> {
        check_lengths(src1.len(), src2.map(<[u64]>::len), dst.len())?;
        let mut carry = carry;
        for i in (0..dst.len()).rev() {
            let c = src2.map_or(0, |s| s[i]);
            (dst[i], carry) = mul_add(src1[i], multiplier, c, carry, self.base);
        }
        Ok(carry)
    }

    /// `dst = (remainder·base^n + src) / divisor`, most significant digit first,
    /// returning the final remainder. `remainder` must be below `divisor`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn divide(
        &self,
        src: &[u64],
        divisor: u64,
        remainder: u64,
        dst: &mut [u64],
    ) -> Result<u64, EngineError> {
        check_lengths(src.len(), None, dst.len())?;
        if divisor == 0 {
            return Err(EngineError::configuration("division by zero"));
        }
        if remainder >= divisor {
            return Err(EngineError::internal(format!(
                "remainder {remainder} is not below divisor {divisor}"
            )));
        }
        let divisor = u128::from(divisor);
        let mut remainder = u128::from(remainder);
        for (d, &s) in dst.iter_mut().zip(src) {
            let value = remainder * u128::from(self.base) + u128::from(s);
            *d = (value / divisor) as u64;
            remainder = value % divisor;
        }
        Ok(remainder as u64)
    }

    /// Add a carry of any size below `base²` into `digits` from the least
    /// significant end, returning what overflows the most significant digit.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_carry(&self, digits: &mut [u64], carry: u128) -> u128 {
        let base = u128::from(self.base);
        let mut carry = carry;
        for d in digits.iter_mut().rev() {
            if carry == 0 {
                break;
            }
            let value = u128::from(*d) + carry;
            *d = (value % base) as u64;
            carry = value / base;
        }
        carry
    }
}

/// Shift leading zero digits out of `digits`, filling the freed positions at
/// the least significant end with zeros. Returns the number of positions
/// shifted; an all-zero sequence is left as is.
pub fn normalize(digits: &mut [u64]) -> usize {
    let shift = digits.iter().take_while(|&&d| d == 0).count();
    if shift == 0 || shift == digits.len() {
        return shift;
    }
    digits.copy_within(shift.., 0);
    let len = digits.len();
    digits[len - shift..].fill(0);
    shift
}

fn check_lengths(src1: usize, src2: Option<usize>, dst: usize) -> Result<(), EngineError> {
    if src1 != dst || src2.is_some_and(|len| len != dst) {
        return Err(EngineError::internal(format!(
            "digit slices of unequal length ({src1}, {src2:?}, {dst})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn value(digits: &[u64], base: u64) -> u128 {
        digits
            .iter()
            .fold(0u128, |acc, &d| acc * u128::from(base) + u128::from(d))
    }

    #[test]
    fn primitive_carries() {
        assert_eq!(add_with_carry(9, 9, 1, 10), (9, 1));
        assert_eq!(add_with_carry(3, 4, 0, 10), (7, 0));
        assert_eq!(sub_with_borrow(0, 1, 0, 10), (9, 1));
        assert_eq!(sub_with_borrow(5, 3, 1, 10), (1, 0));
        assert_eq!(mul_add(9, 9, 9, 9, 10), (9, 9));
        let big = (1u64 << 60) - 1;
        assert_eq!(mul_add(big, big, big, big, 1 << 60), (big, big));
    }

    #[test]
    fn add_propagates_through_all_digits() {
        let m = BaseMath::new(10).unwrap();
        let mut dst = [0; 3];
        let carry = m.add(&[9, 9, 9], None, 1, &mut dst).unwrap();
        assert_eq!((dst, carry), ([0, 0, 0], 1));
        let carry = m.add(&[1, 2, 3], Some(&[4, 5, 8]), 0, &mut dst).unwrap();
        assert_eq!((dst, carry), ([5, 8, 1], 0));
    }

    #[test]
    fn subtract_with_borrow_out() {
        let m = BaseMath::new(1_000).unwrap();
        let mut dst = [0; 2];
        let borrow = m.subtract(&[0, 0], Some(&[0, 1]), 0, &mut dst).unwrap();
        assert_eq!((dst, borrow), ([999, 999], 1));
    }

    #[test]
    fn multiply_add_and_divide_invert() {
        let m = BaseMath::new(1_000_000_000).unwrap();
        let src = [123_456_789, 987_654_321, 5];
        let mut product = [0; 3];
        let carry = m.multiply_add(&src, None, 77, 0, &mut product).unwrap();
        let mut quotient = [0; 3];
        let remainder = m.divide(&product, 77, carry, &mut quotient).unwrap();
        assert_eq!((quotient, remainder), (src, 0));
    }

    #[test]
    fn add_carry_stops_early() {
        let m = BaseMath::new(10).unwrap();
        let mut digits = [5, 9, 9];
        assert_eq!(m.add_carry(&mut digits, 13), 0);
        assert_eq!(digits, [6, 1, 2]);
        let mut digits = [9, 9];
        assert_eq!(m.add_carry(&mut digits, 99), 1);
        assert_eq!(digits, [9, 8]);
    }

    #[test]
    fn errors() {
        let m = BaseMath::new(10).unwrap();
        let mut dst = [0; 2];
        assert!(m.add(&[1], None, 0, &mut dst).unwrap_err().is_internal());
        assert!(m.divide(&[1, 2], 0, 0, &mut dst).unwrap_err().is_configuration());
        assert!(m.divide(&[1, 2], 3, 3, &mut dst).unwrap_err().is_internal());
        assert!(BaseMath::new(1).is_err());
    }

    #[test]
    fn normalize_shifts_out_leading_zeros() {
        let mut digits = [0, 0, 3, 4];
        assert_eq!(normalize(&mut digits), 2);
        assert_eq!(digits, [3, 4, 0, 0]);
        let mut zeros = [0, 0];
        assert_eq!(normalize(&mut zeros), 2);
        assert_eq!(zeros, [0, 0]);
        let mut leading = [1, 0];
        assert_eq!(normalize(&mut leading), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn add_matches_integers(a in prop::collection::vec(0u64..1_000_000, 1..4), seed in any::<u64>()) {
            let base = 1_000_000;
            let b: Vec<u64> = a.iter().map(|&x| (x ^ seed) % base).collect();
            let m = BaseMath::new(base).unwrap();
            let mut dst = vec![0; a.len()];
            let carry = m.add(&a, Some(&b), 0, &mut dst).unwrap();
            let scale = u128::from(base).pow(a.len() as u32);
            prop_assert_eq!(
                value(&dst, base) + u128::from(carry) * scale,
                value(&a, base) + value(&b, base)
            );
        }

        #[test]
        fn divide_matches_integers(src in prop::collection::vec(0u64..1 << 20, 1..4), divisor in 1u64..1 << 20) {
            let base = 1 << 20;
            let m = BaseMath::new(base).unwrap();
            let mut dst = vec![0; src.len()];
            let r = m.divide(&src, divisor, 0, &mut dst).unwrap();
            let n = value(&src, base);
            prop_assert_eq!(value(&dst, base), n / u128::from(divisor));
            prop_assert_eq!(u128::from(r), n % u128::from(divisor));
        }
    }
}
