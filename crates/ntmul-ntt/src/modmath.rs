//! Modular arithmetic modulo the three transform primes.
//!
//! Each prime has the form `k·2^n + 1` with `3·2^55` dividing `p - 1`, so every
//! transform length `2^k` or `3·2^k` up to [`MAX_TRANSFORM_LENGTH`] has a root of
//! unity. Products are reduced with Montgomery reduction over `u128`.

/// Number of moduli in the set.
pub const MODULUS_COUNT: usize = 3;

/// The transform primes, largest first.
pub const MODULI: [u64; MODULUS_COUNT] = [
    0x5700_0000_0000_0001, // 87·2^56 + 1
    0x2280_0000_0000_0001, // 69·2^55 + 1
    0x1c80_0000_0000_0001, // 57·2^55 + 1
];

/// A primitive root of each prime.
pub const PRIMITIVE_ROOTS: [u64; MODULUS_COUNT] = [5, 5, 7];

/// Largest power-of-two transform length.
pub const MAX_POWER_OF_TWO_LENGTH: usize = 1 << 55;

/// Largest transform length (`3·2^55`).
pub const MAX_TRANSFORM_LENGTH: usize = 3 << 55;

/// One prime modulus with its Montgomery constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modulus {
    p: u64,
    /// `-p^-1 mod 2^64`.
    p_neg_inv: u64,
    /// `2^128 mod p`.
    r2: u64,
    primitive_root: u64,
}

impl Modulus {
    /// Precompute the Montgomery constants of an odd prime `p`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(p: u64, primitive_root: u64) -> Self {
        // Newton iteration doubles the correct low bits each step: 3, 6, 12, 24, 48, 96.
        let mut inv = p;
        let mut i = 0;
        while i < 5 {
            inv = inv.wrapping_mul(2u64.wrapping_sub(p.wrapping_mul(inv)));
            i += 1;
        }
        let r = (1u128 << 64) % (p as u128);
        let r2 = (r * r % (p as u128)) as u64;
        Self {
            p,
            p_neg_inv: inv.wrapping_neg(),
            r2,
            primitive_root,
        }
    }

    /// The `index`-th modulus of the set.
    #[must_use]
    pub const fn of_set(index: usize) -> Self {
        Self::new(MODULI[index], PRIMITIVE_ROOTS[index])
    }

    /// The prime.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.p
    }

    /// The primitive root.
    #[must_use]
    pub const fn primitive_root(&self) -> u64 {
        self.primitive_root
    }

    /// `(a + b) mod p` for reduced operands.
    #[inline]
    #[must_use]
    pub fn add(&self, a: u64, b: u64) -> u64 {
        let sum = a + b;
        if sum >= self.p {
            sum - self.p
        } else {
            sum
        }
    }

    /// `(a - b) mod p` for reduced operands.
    #[inline]
    #[must_use]
    pub fn sub(&self, a: u64, b: u64) -> u64 {
        if a >= b {
            a - b
        } else {
            a + self.p - b
        }
    }

    /// `-a mod p` for a reduced operand.
    #[inline]
    #[must_use]
    pub fn neg(&self, a: u64) -> u64 {
        if a == 0 {
            0
        } else {
            self.p - a
        }
    }

    /// Montgomery reduction: `t · 2^-64 mod p` for `t < p · 2^64`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn reduce(&self, t: u128) -> u64 {
        let m = (t as u64).wrapping_mul(self.p_neg_inv);
        let mp = u128::from(m) * u128::from(self.p);
        // t + m·p < 2^127 + 2^127; the low 64 bits cancel by construction.
        let (low, carry) = (t as u64).overflowing_add(mp as u64);
        debug_assert_eq!(low, 0);
        let u = (t >> 64) + (mp >> 64) + u128::from(carry);
        let u = u as u64;
        if u >= self.p {
            u - self.p
        } else {
            u
        }
    }

    /// Convert to Montgomery form (`a · 2^64 mod p`).
    #[inline]
    #[must_use]
    pub fn to_montgomery(&self, a: u64) -> u64 {
        self.reduce(u128::from(a) * u128::from(self.r2))
    }

    /// Convert from Montgomery form.
    #[inline]
    #[must_use]
    pub fn from_montgomery(&self, a: u64) -> u64 {
        self.reduce(u128::from(a))
    }

    /// `a · b mod p` where `b_mont` is in Montgomery form and `a` is not.
    ///
    /// Also multiplies two Montgomery values, giving the Montgomery form of the product.
    #[inline]
    #[must_use]
    pub fn mul_montgomery(&self, a: u64, b_mont: u64) -> u64 {
        self.reduce(u128::from(a) * u128::from(b_mont))
    }

    /// `a · b mod p` for reduced operands.
    #[inline]
    #[must_use]
    pub fn mul(&self, a: u64, b: u64) -> u64 {
        let t = self.reduce(u128::from(a) * u128::from(b));
        self.reduce(u128::from(t) * u128::from(self.r2))
    }

    /// `base^exp mod p`.
    #[must_use]
    pub fn pow(&self, base: u64, mut exp: u64) -> u64 {
        let mut result = self.to_montgomery(1);
        let mut square = self.to_montgomery(base % self.p);
        while exp > 0 {
            if exp & 1 == 1 {
                result = self.mul_montgomery(result, square);
            }
            square = self.mul_montgomery(square, square);
            exp >>= 1;
        }
        self.from_montgomery(result)
    }

    /// `a^-1 mod p` for `a` not divisible by `p`.
    #[must_use]
    pub fn inv(&self, a: u64) -> u64 {
        self.pow(a, self.p - 2)
    }

    /// Reduce an arbitrary value.
    #[must_use]
    pub fn reduce_value(&self, a: u64) -> u64 {
        a % self.p
    }

    /// Check that a root of unity of order `length` exists.
    #[must_use]
    pub fn supports_length(&self, length: usize) -> bool {
        length > 0 && (self.p - 1) % (length as u64) == 0
    }

    /// A primitive `length`-th root of unity, or `None` if none exists.
    #[must_use]
    pub fn forward_root(&self, length: usize) -> Option<u64> {
        self.supports_length(length)
            .then(|| self.pow(self.primitive_root, (self.p - 1) / length as u64))
    }

    /// The inverse of [`forward_root`](Self::forward_root).
    #[must_use]
    pub fn inverse_root(&self, length: usize) -> Option<u64> {
        self.forward_root(length).map(|w| self.inv(w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_mul(m: &Modulus, a: u64, b: u64) -> u64 {
        #[allow(clippy::cast_possible_truncation)]
        let r = (u128::from(a) * u128::from(b) % u128::from(m.value())) as u64;
        r
    }

    #[test]
    fn moduli_support_every_transform_length() {
        for i in 0..MODULUS_COUNT {
            let m = Modulus::of_set(i);
            assert!(m.supports_length(MAX_TRANSFORM_LENGTH));
            assert!(m.supports_length(MAX_POWER_OF_TWO_LENGTH));
            assert!(m.value() < 1 << 63);
            assert!(m.value() > 1_000_000_000_000_000_000);
        }
    }

    #[test]
    fn montgomery_constant_is_negated_inverse() {
        for i in 0..MODULUS_COUNT {
            let m = Modulus::of_set(i);
            assert_eq!(m.value().wrapping_mul(m.p_neg_inv), u64::MAX);
        }
    }

    #[test]
    fn mul_matches_u128() {
        for i in 0..MODULUS_COUNT {
            let m = Modulus::of_set(i);
            let p = m.value();
            for &(a, b) in &[(0, 5), (1, p - 1), (p - 1, p - 1), (123_456_789, 987_654_321_012)] {
                assert_eq!(m.mul(a, b), naive_mul(&m, a, b));
                assert_eq!(m.mul_montgomery(a, m.to_montgomery(b)), naive_mul(&m, a, b));
            }
        }
    }

    #[test]
    fn montgomery_round_trip() {
        let m = Modulus::of_set(1);
        for a in [0, 1, 2, m.value() - 1, 42] {
            assert_eq!(m.from_montgomery(m.to_montgomery(a)), a);
        }
    }

    #[test]
    fn add_sub_neg() {
        let m = Modulus::of_set(2);
        let p = m.value();
        assert_eq!(m.add(p - 1, 1), 0);
        assert_eq!(m.sub(0, 1), p - 1);
        assert_eq!(m.neg(0), 0);
        assert_eq!(m.add(m.neg(17), 17), 0);
    }

    #[test]
    fn inverse_and_pow() {
        let m = Modulus::of_set(0);
        assert_eq!(m.mul(m.inv(3), 3), 1);
        assert_eq!(m.pow(2, 10), 1024);
        assert_eq!(m.pow(7, 0), 1);
    }

    #[test]
    fn roots_have_exact_order() {
        for i in 0..MODULUS_COUNT {
            let m = Modulus::of_set(i);
            for length in [2usize, 3, 8, 24, 1 << 20, MAX_TRANSFORM_LENGTH] {
                let w = m.forward_root(length).unwrap();
                assert_eq!(m.pow(w, length as u64), 1);
                if length % 2 == 0 {
                    assert_ne!(m.pow(w, (length / 2) as u64), 1);
                }
                if length % 3 == 0 {
                    assert_ne!(m.pow(w, (length / 3) as u64), 1);
                }
                assert_eq!(m.mul(w, m.inverse_root(length).unwrap()), 1);
            }
            assert_eq!(m.forward_root(2), Some(m.value() - 1));
        }
    }

    #[test]
    fn unsupported_length_has_no_root() {
        let m = Modulus::of_set(0);
        assert!(m.forward_root(5).is_none());
        assert!(m.forward_root(0).is_none());
        assert!(m.forward_root(1 << 58).is_none());
    }
}
