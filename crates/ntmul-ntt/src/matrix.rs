//! In-place transposition of power-of-two matrices.
//!
//! Square matrices are transposed tile by tile so that both the source and the
//! mirrored tile stay cache resident. An `n × 2n` matrix is handled as two
//! `n × n` squares: the interleaved half-rows are first gathered into the two
//! squares by a block permutation, then each square is transposed in place. The
//! `2n × n` case runs the same steps in reverse order.

use crate::error::NttError;

/// Blocked in-place matrix transpose.
#[derive(Debug, Clone, Copy)]
pub struct MatrixStrategy {
    tile: usize,
}

impl MatrixStrategy {
    /// Create a transposer with tiles of `tile` × `tile` elements.
    #[must_use]
    pub fn new(tile: usize) -> Self {
        Self { tile: tile.max(1) }
    }

    /// Transpose the `n1 × n2` row-major matrix at the start of `data` into an
    /// `n2 × n1` matrix.
    ///
    /// Both sides must be powers of two and differ by at most a factor of two.
    pub fn transpose(&self, data: &mut [u64], n1: usize, n2: usize) -> Result<(), NttError> {
        if !n1.is_power_of_two() || !n2.is_power_of_two() {
            return Err(NttError::Configuration(format!(
                "cannot transpose a {n1}x{n2} matrix: sides must be powers of two"
            )));
        }
        let size = n1 * n2;
        if data.len() < size {
            return Err(NttError::InternalConsistency(format!(
                "{n1}x{n2} matrix does not fit in {} elements",
                data.len()
            )));
        }
        let data = &mut data[..size];
        if n1 == n2 {
            self.transpose_square(data, n1);
        } else if n2 == 2 * n1 {
            let n = n1;
            permute_blocks(data, 2 * n, n, |k| if k % 2 == 0 { k / 2 } else { n + k / 2 });
            let (left, right) = data.split_at_mut(n * n);
            self.transpose_square(left, n);
            self.transpose_square(right, n);
        } else if n1 == 2 * n2 {
            let n = n2;
            let (top, bottom) = data.split_at_mut(n * n);
            self.transpose_square(top, n);
            self.transpose_square(bottom, n);
            permute_blocks(data, 2 * n, n, |k| if k < n { 2 * k } else { 2 * (k - n) + 1 });
        } else {
            return Err(NttError::Configuration(format!(
                "cannot transpose a {n1}x{n2} matrix: sides differ by more than a factor of two"
            )));
        }
        Ok(())
    }

    fn transpose_square(&self, data: &mut [u64], n: usize) {
        let tile = self.tile.min(n);
        for ib in (0..n).step_by(tile) {
            for jb in (ib..n).step_by(tile) {
                for i in ib..(ib + tile).min(n) {
                    let j_start = if ib == jb { i + 1 } else { jb };
                    for j in j_start..(jb + tile).min(n) {
                        data.swap(i * n + j, j * n + i);
                    }
                }
            }
        }
    }
}

/// Move block `k` (of `size` elements) to position `dest(k)`, following cycles.
fn permute_blocks(data: &mut [u64], count: usize, size: usize, dest: impl Fn(usize) -> usize) {
    let mut moved = vec![false; count];
    let mut carried = vec![0; size];
    let mut displaced = vec![0; size];
    for start in 0..count {
        if moved[start] {
            continue;
        }
        moved[start] = true;
        let mut target = dest(start);
        if target == start {
            continue;
        }
        carried.copy_from_slice(&data[start * size..(start + 1) * size]);
        loop {
            let slot = &mut data[target * size..(target + 1) * size];
            displaced.copy_from_slice(slot);
            slot.copy_from_slice(&carried);
            std::mem::swap(&mut carried, &mut displaced);
            moved[target] = true;
            if target == start {
                break;
            }
            target = dest(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn reference(data: &[u64], n1: usize, n2: usize) -> Vec<u64> {
        (0..n2)
            .flat_map(|c| (0..n1).map(move |r| (r, c)))
            .map(|(r, c)| data[r * n2 + c])
            .collect()
    }

    #[test]
    fn transposes_all_supported_shapes() {
        let strategy = MatrixStrategy::new(4);
        for (n1, n2) in [(1, 1), (1, 2), (2, 1), (2, 2), (4, 8), (8, 4), (16, 16), (16, 32), (32, 16)] {
            let data: Vec<u64> = (0..(n1 * n2) as u64).collect();
            let mut t = data.clone();
            strategy.transpose(&mut t, n1, n2).unwrap();
            assert_eq!(t, reference(&data, n1, n2), "{n1}x{n2}");
        }
    }

    #[test]
    fn transpose_twice_is_identity() {
        let strategy = MatrixStrategy::new(2);
        let data: Vec<u64> = (0..128).collect();
        let mut t = data.clone();
        strategy.transpose(&mut t, 8, 16).unwrap();
        strategy.transpose(&mut t, 16, 8).unwrap();
        assert_eq!(t, data);
    }

    #[test]
    fn trailing_elements_are_untouched() {
        let strategy = MatrixStrategy::new(8);
        let mut data: Vec<u64> = (0..10).collect();
        strategy.transpose(&mut data, 2, 4).unwrap();
        assert_eq!(&data[8..], &[8, 9]);
    }

    #[test]
    fn unsupported_shapes_are_rejected() {
        let strategy = MatrixStrategy::new(8);
        let mut data = vec![0; 64];
        assert!(matches!(
            strategy.transpose(&mut data, 2, 8),
            Err(NttError::Configuration(_))
        ));
        assert!(matches!(
            strategy.transpose(&mut data, 3, 3),
            Err(NttError::Configuration(_))
        ));
        assert!(matches!(
            strategy.transpose(&mut data, 8, 16),
            Err(NttError::InternalConsistency(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn matches_reference(log in 0u32..6, wide in any::<bool>(), tile in 1usize..20) {
            let n1 = 1usize << log;
            let n2 = if wide { 2 * n1 } else { n1 };
            let data: Vec<u64> = (0..(n1 * n2) as u64).map(|v| v * 7 + 3).collect();
            let mut t = data.clone();
            MatrixStrategy::new(tile).transpose(&mut t, n1, n2).unwrap();
            prop_assert_eq!(t, reference(&data, n1, n2));
        }
    }
}
