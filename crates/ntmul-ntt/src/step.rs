//! Row transforms and element-wise kernels for one modulus at a time.
//!
//! Forward row transforms use decimation in frequency: natural-order input,
//! bit-reversed output. Inverse row transforms use decimation in time and take
//! bit-reversed input. With `permute` the forward output (or the inverse input)
//! is reordered so that rows are in natural order, which the six-step
//! decomposition needs for its first pass.

use std::sync::Arc;

use rayon::prelude::*;

use crate::context::NttContext;
use crate::error::NttError;
use crate::modmath::Modulus;

/// Below this many elements, rows are transformed on the calling thread.
const PARALLEL_THRESHOLD: usize = 1 << 14;

/// Row-transform and twiddle kernels.
///
/// Methods take `&mut self`: a step strategy is owned by one worker and never
/// shared. Workers that run concurrently each build their own.
#[derive(Debug, Clone)]
pub struct NttStepStrategy {
    ctx: Arc<NttContext>,
}

impl NttStepStrategy {
    /// Create a step strategy over the given context.
    #[must_use]
    pub fn new(ctx: Arc<NttContext>) -> Self {
        Self { ctx }
    }

    /// The shared context.
    #[must_use]
    pub fn context(&self) -> &Arc<NttContext> {
        &self.ctx
    }

    /// Transform `count` consecutive rows of `length` elements in `data`.
    pub fn transform_rows(
        &mut self,
        data: &mut [u64],
        length: usize,
        count: usize,
        inverse: bool,
        permute: bool,
        modulus: usize,
    ) -> Result<(), NttError> {
        check_rows(data.len(), length, count)?;
        if length < 2 {
            return Ok(());
        }
        let m = *self.ctx.modulus(modulus)?;
        let table = self.ctx.roots(modulus, length, inverse)?;
        let rows = &mut data[..length * count];
        let kernel = |row: &mut [u64]| {
            if inverse {
                if permute {
                    bit_reverse(row);
                }
                inverse_row(row, &table, &m);
            } else {
                forward_row(row, &table, &m);
                if permute {
                    bit_reverse(row);
                }
            }
        };
        if count > 1 && rows.len() >= PARALLEL_THRESHOLD {
            rows.par_chunks_mut(length).for_each(kernel);
        } else {
            rows.chunks_mut(length).for_each(kernel);
        }
        Ok(())
    }

    /// Multiply the `rows × cols` block in `data` by twiddle factors.
    ///
    /// Element `(r, c)` is multiplied by `w^((start_row + r)·(start_col + c))`
    /// where `w` is the `length`-th root of unity (inverse root when `inverse`).
    /// Inverse passes also divide by `total_length`.
    #[allow(clippy::too_many_arguments)]
    pub fn multiply_elements(
        &mut self,
        data: &mut [u64],
        start_row: usize,
        start_col: usize,
        rows: usize,
        cols: usize,
        length: usize,
        total_length: usize,
        inverse: bool,
        modulus: usize,
    ) -> Result<(), NttError> {
        check_rows(data.len(), cols, rows)?;
        let m = *self.ctx.modulus(modulus)?;
        let w = root(&m, length, inverse)?;
        let scale = if inverse {
            m.inv(m.reduce_value(total_length as u64))
        } else {
            1
        };
        let kernel = |(r, row): (usize, &mut [u64])| {
            let row_root = m.pow(w, (start_row + r) as u64);
            let step = m.to_montgomery(row_root);
            let mut factor = m.to_montgomery(m.mul(m.pow(row_root, start_col as u64), scale));
            for x in row {
                *x = m.mul_montgomery(*x, factor);
                factor = m.mul_montgomery(factor, step);
            }
        };
        let block = &mut data[..rows * cols];
        if rows > 1 && block.len() >= PARALLEL_THRESHOLD {
            block.par_chunks_mut(cols).enumerate().for_each(kernel);
        } else {
            block.chunks_mut(cols).enumerate().for_each(kernel);
        }
        Ok(())
    }

    /// Multiply every element by `1/total_length`.
    pub fn scale(&mut self, data: &mut [u64], total_length: usize, modulus: usize) -> Result<(), NttError> {
        let m = *self.ctx.modulus(modulus)?;
        let factor = m.to_montgomery(m.inv(m.reduce_value(total_length as u64)));
        for x in data {
            *x = m.mul_montgomery(*x, factor);
        }
        Ok(())
    }

    /// `dst[i] = dst[i] · src[i] mod p`.
    pub fn multiply_in_place(&mut self, dst: &mut [u64], src: &[u64], modulus: usize) -> Result<(), NttError> {
        if dst.len() != src.len() {
            return Err(NttError::InternalConsistency(format!(
                "pointwise multiply of {} and {} elements",
                dst.len(),
                src.len()
            )));
        }
        let m = *self.ctx.modulus(modulus)?;
        dst.par_iter_mut()
            .zip(src.par_iter())
            .with_min_len(PARALLEL_THRESHOLD)
            .for_each(|(d, &s)| *d = m.mul(*d, s));
        Ok(())
    }

    /// `data[i] = data[i]² mod p`.
    pub fn square_in_place(&mut self, data: &mut [u64], modulus: usize) -> Result<(), NttError> {
        let m = *self.ctx.modulus(modulus)?;
        data.par_iter_mut()
            .with_min_len(PARALLEL_THRESHOLD)
            .for_each(|d| *d = m.mul(*d, *d));
        Ok(())
    }

    /// Radix-3 butterflies over matching columns of three rows.
    ///
    /// `columns` are columns `start_column..` of the three thirds of a
    /// transform of `total_length = 3·power2_length` elements. The forward pass
    /// applies the butterfly, then the twiddles `w^c` and `w^2c`; the inverse pass
    /// applies the inverse twiddles first. Neither direction scales.
    pub fn radix3_columns(
        &mut self,
        columns: [&mut [u64]; 3],
        start_column: usize,
        power2_length: usize,
        total_length: usize,
        inverse: bool,
        modulus: usize,
    ) -> Result<(), NttError> {
        let [x0, x1, x2] = columns;
        if x0.len() != x1.len() || x1.len() != x2.len() {
            return Err(NttError::InternalConsistency(
                "radix-3 columns of unequal length".into(),
            ));
        }
        let m = *self.ctx.modulus(modulus)?;
        let w = root(&m, total_length, inverse)?;
        let ww = m.mul(w, w);
        let cube_root = m.pow(w, power2_length as u64);
        let half = m.inv(2);
        let w1 = m.to_montgomery(m.neg(m.mul(3, half)));
        let w2 = m.to_montgomery(m.add(cube_root, half));
        let step1 = m.to_montgomery(w);
        let step2 = m.to_montgomery(ww);
        let mut twiddle1 = m.to_montgomery(m.pow(w, start_column as u64));
        let mut twiddle2 = m.to_montgomery(m.pow(ww, start_column as u64));

        for ((a, b), c) in x0.iter_mut().zip(x1.iter_mut()).zip(x2.iter_mut()) {
            let (mut v0, mut v1, mut v2) = (*a, *b, *c);
            if inverse {
                v1 = m.mul_montgomery(v1, twiddle1);
                v2 = m.mul_montgomery(v2, twiddle2);
            }
            let mut t = m.add(v1, v2);
            v2 = m.sub(v1, v2);
            v0 = m.add(v0, t);
            t = m.mul_montgomery(t, w1);
            v2 = m.mul_montgomery(v2, w2);
            t = m.add(t, v0);
            v1 = m.add(t, v2);
            v2 = m.sub(t, v2);
            if !inverse {
                v1 = m.mul_montgomery(v1, twiddle1);
                v2 = m.mul_montgomery(v2, twiddle2);
            }
            (*a, *b, *c) = (v0, v1, v2);
            twiddle1 = m.mul_montgomery(twiddle1, step1);
            twiddle2 = m.mul_montgomery(twiddle2, step2);
        }
        Ok(())
    }
}

fn root(m: &Modulus, length: usize, inverse: bool) -> Result<u64, NttError> {
    let w = if inverse {
        m.inverse_root(length)
    } else {
        m.forward_root(length)
    };
    w.ok_or_else(|| NttError::Configuration(format!("no root of unity of order {length}")))
}

fn check_rows(available: usize, length: usize, count: usize) -> Result<(), NttError> {
    if length != 0 && !length.is_power_of_two() {
        return Err(NttError::Configuration(format!(
            "row length {length} is not a power of two"
        )));
    }
    match length.checked_mul(count) {
        Some(needed) if needed <= available => Ok(()),
        _ => Err(NttError::InternalConsistency(format!(
            "{count} rows of {length} elements do not fit in {available} elements"
        ))),
    }
}

/// Decimation-in-frequency butterflies; output is in bit-reversed order.
fn forward_row(row: &mut [u64], table: &[u64], m: &Modulus) {
    let n = row.len();
    let mut span = n;
    while span > 1 {
        let half = span / 2;
        let stride = n / span;
        for block in row.chunks_exact_mut(span) {
            let (lo, hi) = block.split_at_mut(half);
            for (j, (a, b)) in lo.iter_mut().zip(hi.iter_mut()).enumerate() {
                let (x, y) = (*a, *b);
                *a = m.add(x, y);
                *b = m.mul_montgomery(m.sub(x, y), table[j * stride]);
            }
        }
        span = half;
    }
}

/// Decimation-in-time butterflies; input is in bit-reversed order.
fn inverse_row(row: &mut [u64], table: &[u64], m: &Modulus) {
    let n = row.len();
    let mut span = 2;
    while span <= n {
        let half = span / 2;
        let stride = n / span;
        for block in row.chunks_exact_mut(span) {
            let (lo, hi) = block.split_at_mut(half);
            for (j, (a, b)) in lo.iter_mut().zip(hi.iter_mut()).enumerate() {
                let x = *a;
                let y = m.mul_montgomery(*b, table[j * stride]);
                *a = m.add(x, y);
                *b = m.sub(x, y);
            }
        }
        span *= 2;
    }
}

/// Reorder a power-of-two slice by bit-reversed index.
pub fn bit_reverse(data: &mut [u64]) {
    let n = data.len();
    let mut j = 0;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            data.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::modmath::MODULUS_COUNT;

    fn step() -> NttStepStrategy {
        NttStepStrategy::new(Arc::new(NttContext::default()))
    }

    /// Direct O(n²) DFT in natural order.
    fn naive_dft(data: &[u64], m: &Modulus, inverse: bool) -> Vec<u64> {
        let n = data.len();
        let w = root(m, n, inverse).unwrap();
        (0..n)
            .map(|k| {
                data.iter().enumerate().fold(0, |acc, (j, &x)| {
                    m.add(acc, m.mul(x, m.pow(w, (j * k) as u64)))
                })
            })
            .collect()
    }

    #[test]
    fn bit_reverse_eight() {
        let mut data: Vec<u64> = (0..8).collect();
        bit_reverse(&mut data);
        assert_eq!(data, vec![0, 4, 2, 6, 1, 5, 3, 7]);
        bit_reverse(&mut data);
        assert_eq!(data, (0..8).collect::<Vec<u64>>());
    }

    #[test]
    fn permuted_forward_matches_dft() {
        let mut s = step();
        for modulus in 0..MODULUS_COUNT {
            let m = Modulus::of_set(modulus);
            let input: Vec<u64> = (0..16).map(|i| i * 1_000_003 + 7).collect();
            let mut data = input.clone();
            s.transform_rows(&mut data, 16, 1, false, true, modulus).unwrap();
            assert_eq!(data, naive_dft(&input, &m, false));
        }
    }

    #[test]
    fn rows_are_independent() {
        let mut s = step();
        let m = Modulus::of_set(0);
        let input: Vec<u64> = (0..32).map(|i| i * i + 1).collect();
        let mut data = input.clone();
        s.transform_rows(&mut data, 8, 4, false, true, 0).unwrap();
        for r in 0..4 {
            assert_eq!(&data[r * 8..(r + 1) * 8], &naive_dft(&input[r * 8..(r + 1) * 8], &m, false)[..]);
        }
    }

    #[test]
    fn unpermuted_round_trip_needs_scaling() {
        let mut s = step();
        let input: Vec<u64> = (0..64).map(|i| i * 31 + 5).collect();
        let mut data = input.clone();
        s.transform_rows(&mut data, 64, 1, false, false, 1).unwrap();
        s.transform_rows(&mut data, 64, 1, true, false, 1).unwrap();
        s.scale(&mut data, 64, 1).unwrap();
        assert_eq!(data, input);
    }

    #[test]
    fn rows_must_fit() {
        let mut s = step();
        let mut data = vec![0; 10];
        assert!(matches!(
            s.transform_rows(&mut data, 4, 3, false, false, 0),
            Err(NttError::InternalConsistency(_))
        ));
        assert!(matches!(
            s.transform_rows(&mut data, 5, 2, false, false, 0),
            Err(NttError::Configuration(_))
        ));
    }

    #[test]
    fn twiddles_then_inverse_twiddles_scale_by_total() {
        let mut s = step();
        let m = Modulus::of_set(2);
        let input: Vec<u64> = (1..=12).collect();
        let mut data = input.clone();
        s.multiply_elements(&mut data, 1, 0, 3, 4, 16, 1, false, 2).unwrap();
        let w = m.forward_root(16).unwrap();
        assert_eq!(data[0], 1);
        assert_eq!(data[1], m.mul(2, w));
        assert_eq!(data[4 + 3], m.mul(8, m.pow(w, 6)));

        s.multiply_elements(&mut data, 1, 0, 3, 4, 16, 16, true, 2).unwrap();
        let inv16 = m.inv(16);
        let expected: Vec<u64> = input.iter().map(|&x| m.mul(x, inv16)).collect();
        assert_eq!(data, expected);
    }

    #[test]
    fn pointwise_kernels() {
        let mut s = step();
        let m = Modulus::of_set(0);
        let mut a = vec![3, m.value() - 1, 0];
        s.multiply_in_place(&mut a, &[5, m.value() - 1, 9], 0).unwrap();
        assert_eq!(a, vec![15, 1, 0]);
        s.square_in_place(&mut a, 0).unwrap();
        assert_eq!(a, vec![225, 1, 0]);
        assert!(s.multiply_in_place(&mut a, &[1], 0).is_err());
    }

    #[test]
    fn radix3_forward_matches_dft_of_length_three() {
        // With a single column and no inner transform, the forward butterfly is
        // a length-3 DFT (twiddles at column 0 are 1).
        let mut s = step();
        for modulus in 0..MODULUS_COUNT {
            let m = Modulus::of_set(modulus);
            let (mut a, mut b, mut c) = (vec![11], vec![22], vec![33]);
            s.radix3_columns([&mut a, &mut b, &mut c], 0, 1, 3, false, modulus)
                .unwrap();
            assert_eq!(vec![a[0], b[0], c[0]], naive_dft(&[11, 22, 33], &m, false));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn row_round_trip(values in prop::collection::vec(any::<u64>(), 1..6), log in 0u32..9) {
            let mut s = step();
            let m = Modulus::of_set(0);
            let n = 1usize << log;
            let input: Vec<u64> = (0..n).map(|i| m.reduce_value(values[i % values.len()] ^ i as u64)).collect();
            for permute in [false, true] {
                let mut data = input.clone();
                s.transform_rows(&mut data, n, 1, false, permute, 0).unwrap();
                s.transform_rows(&mut data, n, 1, true, permute, 0).unwrap();
                s.scale(&mut data, n, 0).unwrap();
                prop_assert_eq!(&data, &input);
            }
        }
    }
}
