//! Transform strategy trait and the tagged union chosen by the selector.

use ntmul_storage::DataStorage;

use crate::error::NttError;
use crate::factor3::Factor3Strategy;
use crate::selector::StrategyKind;
use crate::six_step::SixStepStrategy;
use crate::simple::SimpleStrategy;
use crate::two_pass::TwoPassStrategy;

/// A forward/inverse transform over a whole storage.
///
/// Forward transforms may leave the data in a scrambled (bit-reversed) order;
/// the matching inverse transform of the same strategy undoes it, so the pair is
/// only meaningful for convolution.
pub trait NttStrategy {
    /// Transform `storage` in place modulo the `modulus`-th prime.
    fn transform(&mut self, storage: &DataStorage, modulus: usize) -> Result<(), NttError>;

    /// Inverse-transform `storage` in place, dividing by `total_length`.
    fn inverse_transform(
        &mut self,
        storage: &DataStorage,
        modulus: usize,
        total_length: usize,
    ) -> Result<(), NttError>;
}

/// A strategy for power-of-two lengths.
#[derive(Debug)]
pub enum PowerOfTwoStrategy {
    /// Whole-array single-row transform.
    Simple(SimpleStrategy),
    /// In-memory six-step transform.
    SixStep(SixStepStrategy),
    /// Blocked two-pass transform.
    TwoPass(TwoPassStrategy),
}

impl PowerOfTwoStrategy {
    /// Which kind of strategy this is.
    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Simple(_) => StrategyKind::Simple,
            Self::SixStep(_) => StrategyKind::SixStep,
            Self::TwoPass(_) => StrategyKind::TwoPass,
        }
    }
}

impl NttStrategy for PowerOfTwoStrategy {
    fn transform(&mut self, storage: &DataStorage, modulus: usize) -> Result<(), NttError> {
        match self {
            Self::Simple(s) => s.transform(storage, modulus),
            Self::SixStep(s) => s.transform(storage, modulus),
            Self::TwoPass(s) => s.transform(storage, modulus),
        }
    }

    fn inverse_transform(
        &mut self,
        storage: &DataStorage,
        modulus: usize,
        total_length: usize,
    ) -> Result<(), NttError> {
        match self {
            Self::Simple(s) => s.inverse_transform(storage, modulus, total_length),
            Self::SixStep(s) => s.inverse_transform(storage, modulus, total_length),
            Self::TwoPass(s) => s.inverse_transform(storage, modulus, total_length),
        }
    }
}

/// The strategy built for one transform length.
#[derive(Debug)]
pub enum TransformStrategy {
    /// Length is a power of two.
    PowerOfTwo(PowerOfTwoStrategy),
    /// Length is three times a power of two.
    Factor3(Factor3Strategy),
}

impl TransformStrategy {
    /// Kind of the power-of-two strategy doing the row work.
    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::PowerOfTwo(s) => s.kind(),
            Self::Factor3(s) => s.inner().kind(),
        }
    }

    /// Check if the factor-3 extension is applied.
    #[must_use]
    pub fn is_factor3(&self) -> bool {
        matches!(self, Self::Factor3(_))
    }
}

impl NttStrategy for TransformStrategy {
    fn transform(&mut self, storage: &DataStorage, modulus: usize) -> Result<(), NttError> {
        match self {
            Self::PowerOfTwo(s) => s.transform(storage, modulus),
            Self::Factor3(s) => s.transform(storage, modulus),
        }
    }

    fn inverse_transform(
        &mut self,
        storage: &DataStorage,
        modulus: usize,
        total_length: usize,
    ) -> Result<(), NttError> {
        match self {
            Self::PowerOfTwo(s) => s.inverse_transform(storage, modulus, total_length),
            Self::Factor3(s) => s.inverse_transform(storage, modulus, total_length),
        }
    }
}

/// Check that `storage` has a power-of-two length.
pub(crate) fn power_of_two_length(storage: &DataStorage) -> Result<usize, NttError> {
    let length = storage.len();
    if !length.is_power_of_two() {
        return Err(NttError::Configuration(format!(
            "transform length {length} is not a power of two"
        )));
    }
    Ok(length)
}

/// Split a power-of-two length into `n1 × n2` with `n1 ≤ n2 ≤ 2·n1`.
#[must_use]
pub fn split_length(length: usize) -> (usize, usize) {
    let log = length.trailing_zeros();
    let n1 = 1usize << (log / 2);
    (n1, length / n1)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::modmath::Modulus;

    /// Schoolbook cyclic convolution of length `length` modulo `m`.
    pub(crate) fn cyclic_convolution(a: &[u64], b: &[u64], length: usize, m: &Modulus) -> Vec<u64> {
        let mut out = vec![0; length];
        for (i, &x) in a.iter().enumerate() {
            for (j, &y) in b.iter().enumerate() {
                let k = (i + j) % length;
                out[k] = m.add(out[k], m.mul(m.reduce_value(x), m.reduce_value(y)));
            }
        }
        out
    }

    /// Cyclic convolution through `strategy`: transform both, multiply, invert.
    pub(crate) fn convolve_with(
        strategy: &mut impl NttStrategy,
        a: &[u64],
        b: &[u64],
        length: usize,
        modulus: usize,
    ) -> Vec<u64> {
        let m = Modulus::of_set(modulus);
        let pad = |v: &[u64]| {
            let mut padded = vec![0; length];
            for (i, &x) in v.iter().enumerate() {
                padded[i % length] = m.add(padded[i % length], m.reduce_value(x));
            }
            DataStorage::from_vec(padded).unwrap()
        };
        let (x, y) = (pad(a), pad(b));
        strategy.transform(&x, modulus).unwrap();
        strategy.transform(&y, modulus).unwrap();
        let product: Vec<u64> = x
            .to_vec()
            .unwrap()
            .iter()
            .zip(y.to_vec().unwrap())
            .map(|(&u, v)| m.mul(u, v))
            .collect();
        x.write_from(0, &product).unwrap();
        strategy.inverse_transform(&x, modulus, length).unwrap();
        x.to_vec().unwrap()
    }
}
