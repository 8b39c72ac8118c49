//! Carry-CRT reconstruction: three modular convolutions to one digit sequence.
//!
//! Coefficient `j` of the convolution (`0 ≤ j < size`) is rebuilt from its
//! three residues by the Chinese remainder theorem and lands at digit position
//! `j + 1` of the product; position 0 receives the final carry. Work is split
//! into blocks counted from the least significant end. Each block produces its
//! digits and an outgoing carry independently; a sequential carry pass then
//! adds every block's carry into the next more significant block.
//!
//! When the destination keeps only the most significant `result_size` digits,
//! a block's low digits are not stored. Each block keeps a fixed-size
//! [`Spill`] holding just enough of them to decide whether an incoming carry
//! passes through to the stored digits.

use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use rayon::prelude::*;
use tracing::debug;

use ntmul_ntt::{Modulus, MODULUS_COUNT};
use ntmul_storage::{AccessMode, DataStorage, JointAccess};

use crate::base_math::BaseMath;
use crate::error::EngineError;

/// Digits touched per step when adding a carry into the destination.
const CARRY_WINDOW: usize = 64;

/// A 192-bit unsigned value, least significant word first.
type Wide = [u64; 3];

#[allow(clippy::cast_possible_truncation)]
fn wide_from_u128(v: u128) -> Wide {
    [v as u64, (v >> 64) as u64, 0]
}

#[allow(clippy::cast_possible_truncation)]
fn wide_mul(a: u128, b: u64) -> Wide {
    let low = u128::from(a as u64) * u128::from(b);
    let high = u128::from((a >> 64) as u64) * u128::from(b) + (low >> 64);
    [low as u64, high as u64, (high >> 64) as u64]
}

fn wide_add(a: Wide, b: Wide) -> Wide {
    let (w0, c0) = a[0].overflowing_add(b[0]);
    let (w1, c1a) = a[1].overflowing_add(b[1]);
    let (w1, c1b) = w1.overflowing_add(u64::from(c0));
    let w2 = a[2].wrapping_add(b[2]).wrapping_add(u64::from(c1a || c1b));
    [w0, w1, w2]
}

fn wide_sub(a: Wide, b: Wide) -> Wide {
    let (w0, b0) = a[0].overflowing_sub(b[0]);
    let (w1, b1a) = a[1].overflowing_sub(b[1]);
    let (w1, b1b) = w1.overflowing_sub(u64::from(b0));
    let w2 = a[2].wrapping_sub(b[2]).wrapping_sub(u64::from(b1a || b1b));
    [w0, w1, w2]
}

fn wide_ge(a: Wide, b: Wide) -> bool {
    (a[2], a[1], a[0]) >= (b[2], b[1], b[0])
}

/// `(a / d, a % d)`.
#[allow(clippy::cast_possible_truncation)]
fn wide_divrem(a: Wide, d: u64) -> (Wide, u64) {
    let d = u128::from(d);
    let mut quotient = [0; 3];
    let mut remainder = 0u128;
    for i in (0..3).rev() {
        let value = (remainder << 64) | u128::from(a[i]);
        quotient[i] = (value / d) as u64;
        remainder = value % d;
    }
    (quotient, remainder as u64)
}

fn wide_to_biguint(a: Wide) -> BigUint {
    (BigUint::from(a[2]) << 128u32) + (BigUint::from(a[1]) << 64u32) + a[0]
}

/// Precomputed CRT constants for one element base.
///
/// With `M = p0·p1·p2` and `Mi = M / pi`, a value `x < M` with residues `ri` is
/// `x = Σ ((ri·Ti) mod pi)·Mi  (mod M)` where `Ti = Mi^-1 mod pi`.
#[derive(Debug, Clone)]
pub struct CrtConstants {
    moduli: [Modulus; MODULUS_COUNT],
    inverses: [u64; MODULUS_COUNT],
    cofactors: [u128; MODULUS_COUNT],
    product: Wide,
    math: BaseMath,
}

impl CrtConstants {
    /// Constants for `moduli` and digits in `base`.
    pub fn new(moduli: &[Modulus; MODULUS_COUNT], base: u64) -> Result<Self, EngineError> {
        let math = BaseMath::new(base)?;
        let product = moduli
            .iter()
            .fold(BigUint::from(1u32), |acc, m| acc * m.value());
        let mut inverses = [0; MODULUS_COUNT];
        let mut cofactors = [0; MODULUS_COUNT];
        for (i, m) in moduli.iter().enumerate() {
            let cofactor = &product / m.value();
            let residue = (&cofactor % m.value())
                .to_u64()
                .ok_or_else(|| EngineError::internal("cofactor residue exceeds 64 bits"))?;
            if residue == 0 {
                return Err(EngineError::configuration(format!(
                    "modulus {} is not coprime to the others",
                    m.value()
                )));
            }
            inverses[i] = m.inv(residue);
            cofactors[i] = cofactor
                .to_u128()
                .ok_or_else(|| EngineError::configuration("moduli product does not fit 192 bits"))?;
        }
        let words = product.to_u64_digits();
        if words.len() > 3 {
            return Err(EngineError::configuration(
                "moduli product does not fit 192 bits",
            ));
        }
        let mut wide = [0; 3];
        wide[..words.len()].copy_from_slice(&words);
        Ok(Self {
            moduli: *moduli,
            inverses,
            cofactors,
            product: wide,
            math,
        })
    }

    /// The element base.
    #[must_use]
    pub fn base(&self) -> u64 {
        self.math.base()
    }

    /// The product of the three moduli.
    #[must_use]
    pub fn product(&self) -> BigUint {
        wide_to_biguint(self.product)
    }

    /// Check that a convolution of sequences with `shorter` and `longer`
    /// elements can be reconstructed exactly: every coefficient must stay below
    /// the moduli product, and carries must fit two digits.
    pub fn check_headroom(&self, shorter: usize, longer: usize) -> Result<(), EngineError> {
        let base = self.base();
        let limit = BigUint::from(shorter.min(longer)) * (base - 1) * (base - 1);
        if shorter.min(longer) > 0 && self.product() <= limit {
            return Err(EngineError::configuration(format!(
                "moduli product too small for {shorter}x{longer} elements in base {base}"
            )));
        }
        let size = (shorter + longer) as u128;
        if size >= u128::from(base) {
            return Err(EngineError::configuration(format!(
                "{size} result elements need a base larger than {base}"
            )));
        }
        Ok(())
    }

    /// The coefficient with residues `r`, reduced below the moduli product.
    fn combine(&self, r: [u64; MODULUS_COUNT]) -> Wide {
        let mut sum = [0; 3];
        for i in 0..MODULUS_COUNT {
            let m = &self.moduli[i];
            let y = m.mul(m.reduce_value(r[i]), self.inverses[i]);
            sum = wide_add(sum, wide_mul(self.cofactors[i], y));
        }
        while wide_ge(sum, self.product) {
            sum = wide_sub(sum, self.product);
        }
        sum
    }
}

/// Carry passed from one block to the next more significant one: a value below
/// `base²` held as two digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CarryState {
    high: u64,
    low: u64,
}

impl CarryState {
    /// No carry.
    pub const ZERO: Self = Self { high: 0, low: 0 };

    /// Split `value` into two digits of `base`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_value(value: u128, base: u64) -> Result<Self, EngineError> {
        let base = u128::from(base);
        if value >= base * base {
            return Err(EngineError::internal(format!(
                "carry {value} does not fit two digits"
            )));
        }
        Ok(Self {
            high: (value / base) as u64,
            low: (value % base) as u64,
        })
    }

    /// The carried value.
    #[must_use]
    pub fn value(&self, base: u64) -> u128 {
        u128::from(self.high) * u128::from(base) + u128::from(self.low)
    }

    /// The two digits, most significant first.
    #[must_use]
    pub fn digits(&self) -> [u64; 2] {
        [self.high, self.low]
    }

    /// Check if there is no carry.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.high == 0 && self.low == 0
    }
}

/// A run of coefficients `size - offset - length .. size - offset`, counted
/// from the least significant end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrtBlock {
    /// Coefficients below this block.
    pub offset: usize,
    /// Coefficients in this block.
    pub length: usize,
}

/// Split `size` coefficients into blocks of at most `block_length`.
#[must_use]
pub fn partition(size: usize, block_length: usize) -> Vec<CrtBlock> {
    let block_length = block_length.max(1);
    (0..size)
        .step_by(block_length)
        .map(|offset| CrtBlock {
            offset,
            length: block_length.min(size - offset),
        })
        .collect()
}

/// Digits of a block that fall below the destination, reduced to their effect
/// on a carry.
///
/// An incoming carry is below `base²`, so it changes at most the two least
/// significant discarded digits plus a ripple of one through the rest. The rest
/// can stop that ripple unless every one of its digits is `base - 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Spill {
    low: u128,
    width: u32,
    absorbs: bool,
}

impl Spill {
    /// Summarize `digits`, most significant first.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn of(digits: &[u64], base: u64) -> Self {
        let width = digits.len().min(2);
        let (upper, lower) = digits.split_at(digits.len() - width);
        Self {
            low: lower
                .iter()
                .fold(0, |acc, &d| acc * u128::from(base) + u128::from(d)),
            width: width as u32,
            absorbs: upper.iter().any(|&d| d != base - 1),
        }
    }

    /// Check if there are no discarded digits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0
    }

    /// The carry out of the discarded digits after adding `incoming` to them.
    #[must_use]
    pub fn carry_out(&self, incoming: u128, base: u64) -> u128 {
        if self.is_empty() {
            return incoming;
        }
        let carry = (self.low + incoming) / u128::from(base).pow(self.width);
        if self.absorbs {
            0
        } else {
            carry
        }
    }
}

/// What one block leaves for the carry pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockOutput {
    block: CrtBlock,
    region_start: usize,
    region_len: usize,
    spill: Spill,
    carry: CarryState,
}

impl BlockOutput {
    /// The block this output belongs to.
    #[must_use]
    pub fn block(&self) -> CrtBlock {
        self.block
    }

    /// The block's own outgoing carry.
    #[must_use]
    pub fn carry(&self) -> CarryState {
        self.carry
    }

    /// The block's digits below the destination.
    #[must_use]
    pub fn spill(&self) -> Spill {
        self.spill
    }
}

/// Per-worker CRT step: reconstructs blocks and runs the carry pass.
///
/// Methods take `&mut self`; concurrent workers each own one.
#[derive(Debug, Clone)]
pub struct CarryCrt {
    constants: Arc<CrtConstants>,
}

impl CarryCrt {
    /// Create a CRT step over shared constants.
    #[must_use]
    pub fn new(constants: Arc<CrtConstants>) -> Self {
        Self { constants }
    }

    /// Reconstruct `block` of a `size`-coefficient convolution from `residues`
    /// into `dst` (the most significant `dst.len()` digits of the product).
    pub fn crt(
        &mut self,
        residues: [&DataStorage; MODULUS_COUNT],
        dst: &DataStorage,
        size: usize,
        block: CrtBlock,
    ) -> Result<BlockOutput, EngineError> {
        let result_size = dst.len();
        let end = size
            .checked_sub(block.offset)
            .filter(|&end| end >= block.length)
            .ok_or_else(|| {
                EngineError::internal(format!("block {block:?} outside {size} coefficients"))
            })?;
        let start = end - block.length;
        let first = if start == 0 { 0 } else { start + 1 };
        let mut digits = vec![0; end + 1 - first];

        let base = self.constants.base();
        let limit = u128::from(base) * u128::from(base);
        let mut carry = 0u128;
        if block.length > 0 {
            let access = JointAccess::new(AccessMode::Read, residues, start, block.length)?;
            let [r0, r1, r2] = access.views()?;
            for k in (0..block.length).rev() {
                let value = wide_add(self.constants.combine([r0[k], r1[k], r2[k]]), wide_from_u128(carry));
                let (quotient, digit) = wide_divrem(value, base);
                let next = u128::from(quotient[0]) | (u128::from(quotient[1]) << 64);
                if quotient[2] != 0 || next >= limit {
                    return Err(EngineError::internal(format!(
                        "carry at coefficient {} exceeds two digits",
                        start + k
                    )));
                }
                carry = next;
                digits[start + k + 1 - first] = digit;
            }
        }
        if start == 0 {
            carry = self.constants.math.add_carry(&mut digits[..1], carry);
        }

        let region_len = result_size.min(end + 1).saturating_sub(first);
        if region_len > 0 {
            let mut access = dst.access(AccessMode::Write, first, region_len)?;
            access.data_mut()?.copy_from_slice(&digits[..region_len]);
            access.close()?;
        }
        Ok(BlockOutput {
            block,
            region_start: first,
            region_len,
            spill: Spill::of(&digits[region_len..], base),
            carry: CarryState::from_value(carry, base)?,
        })
    }

    /// Add `incoming` (the carry of the next less significant block) into the
    /// digits of `output`, returning the carry for the next more significant block.
    pub fn carry(
        &mut self,
        dst: &DataStorage,
        output: BlockOutput,
        incoming: CarryState,
    ) -> Result<CarryState, EngineError> {
        let base = self.constants.base();
        let math = self.constants.math;
        let mut carry = output.spill.carry_out(incoming.value(base), base);
        let mut end = output.region_start + output.region_len;
        while carry != 0 && end > output.region_start {
            let begin = end.saturating_sub(CARRY_WINDOW).max(output.region_start);
            let mut access = dst.access(AccessMode::ReadWrite, begin, end - begin)?;
            carry = math.add_carry(access.data_mut()?, carry);
            access.close()?;
            end = begin;
        }
        CarryState::from_value(output.carry.value(base) + carry, base)
    }
}

/// Reconstruct a `size`-coefficient convolution into `dst`, block by block.
///
/// `blocks` must cover the coefficients contiguously from offset 0. Blocks are
/// reconstructed in parallel, then carries are propagated in order.
pub fn reconstruct(
    constants: &Arc<CrtConstants>,
    residues: [&DataStorage; MODULUS_COUNT],
    dst: &DataStorage,
    size: usize,
    blocks: &[CrtBlock],
) -> Result<(), EngineError> {
    let mut expected = 0;
    for block in blocks {
        if block.offset != expected {
            return Err(EngineError::internal(format!(
                "block at offset {} does not follow offset {expected}",
                block.offset
            )));
        }
        expected += block.length;
    }
    if expected != size {
        return Err(EngineError::internal(format!(
            "blocks cover {expected} of {size} coefficients"
        )));
    }
    if dst.len() > size + 1 {
        return Err(EngineError::internal(format!(
            "{} result digits requested from {size} coefficients",
            dst.len()
        )));
    }
    debug!(size, blocks = blocks.len(), result_size = dst.len(), "carry-CRT");

    let outputs = blocks
        .par_iter()
        .map_init(
            || CarryCrt::new(Arc::clone(constants)),
            |crt, &block| crt.crt(residues, dst, size, block),
        )
        .collect::<Result<Vec<_>, _>>()?;

    let mut crt = CarryCrt::new(Arc::clone(constants));
    let mut carry = CarryState::ZERO;
    for output in outputs {
        carry = crt.carry(dst, output, carry)?;
    }
    if !carry.is_zero() {
        return Err(EngineError::internal(format!(
            "residual carry {} after the most significant block",
            carry.value(constants.base())
        )));
    }
    Ok(())
}
