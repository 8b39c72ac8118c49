//! Factor-3 extension: transforms of length `3·2^k` around a power-of-two strategy.
//!
//! The storage is split into three consecutive thirds. A forward transform runs
//! radix-3 butterflies down matching columns of the thirds, then transforms each
//! third with the inner strategy. The inverse runs the same steps backwards.
//! Pure power-of-two lengths go straight to the inner strategy.

use std::sync::Arc;

use tracing::trace;

use ntmul_storage::{AccessMode, DataStorage, JointAccess};

use crate::config::NttConfig;
use crate::context::NttContext;
use crate::error::NttError;
use crate::step::NttStepStrategy;
use crate::strategy::{NttStrategy, PowerOfTwoStrategy};

/// Wraps a power-of-two strategy to support lengths `3·2^k`.
#[derive(Debug)]
pub struct Factor3Strategy {
    inner: PowerOfTwoStrategy,
    step: NttStepStrategy,
    max_block: usize,
}

impl Factor3Strategy {
    /// Wrap `inner`; column butterflies are staged in blocks bounded by the
    /// configured memory block.
    #[must_use]
    pub fn new(inner: PowerOfTwoStrategy, ctx: Arc<NttContext>, config: &NttConfig) -> Self {
        Self {
            inner,
            step: NttStepStrategy::new(ctx),
            max_block: config.max_block_elements(),
        }
    }

    /// The wrapped power-of-two strategy.
    #[must_use]
    pub fn inner(&self) -> &PowerOfTwoStrategy {
        &self.inner
    }

    fn thirds(storage: &DataStorage) -> Result<Option<[DataStorage; 3]>, NttError> {
        let length = storage.len();
        let power2 = length & length.wrapping_neg();
        if length == power2 {
            return Ok(None);
        }
        if length != 3 * power2 {
            return Err(NttError::Configuration(format!(
                "transform length {length} is neither 2^k nor 3·2^k"
            )));
        }
        Ok(Some([
            storage.subsequence(0, power2)?,
            storage.subsequence(power2, power2)?,
            storage.subsequence(2 * power2, power2)?,
        ]))
    }

    fn columns(
        &mut self,
        parts: &[DataStorage; 3],
        modulus: usize,
        inverse: bool,
    ) -> Result<(), NttError> {
        let power2 = parts[0].len();
        let total_length = 3 * power2;
        let block = (self.max_block / 3).clamp(1, power2);
        for start in (0..power2).step_by(block) {
            let len = block.min(power2 - start);
            trace!(start, len, inverse, "radix-3 column block");
            let mut access =
                JointAccess::new(AccessMode::ReadWrite, [&parts[0], &parts[1], &parts[2]], start, len)?;
            self.step.radix3_columns(
                access.views_mut()?,
                start,
                power2,
                total_length,
                inverse,
                modulus,
            )?;
            access.close()?;
        }
        Ok(())
    }
}

impl NttStrategy for Factor3Strategy {
    fn transform(&mut self, storage: &DataStorage, modulus: usize) -> Result<(), NttError> {
        let Some(parts) = Self::thirds(storage)? else {
            return self.inner.transform(storage, modulus);
        };
        self.columns(&parts, modulus, false)?;
        for part in &parts {
            self.inner.transform(part, modulus)?;
        }
        Ok(())
    }

    fn inverse_transform(
        &mut self,
        storage: &DataStorage,
        modulus: usize,
        total_length: usize,
    ) -> Result<(), NttError> {
        let Some(parts) = Self::thirds(storage)? else {
            return self.inner.inverse_transform(storage, modulus, total_length);
        };
        for part in &parts {
            self.inner.inverse_transform(part, modulus, total_length)?;
        }
        self.columns(&parts, modulus, true)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::modmath::{Modulus, MODULUS_COUNT};
    use crate::simple::SimpleStrategy;
    use crate::six_step::SixStepStrategy;
    use crate::strategy::testing::{convolve_with, cyclic_convolution};
    use crate::two_pass::TwoPassStrategy;

    fn wrapped(kind: usize, max_block_elements: usize) -> Factor3Strategy {
        let ctx = Arc::new(NttContext::default());
        let config = NttConfig {
            max_memory_block_bytes: max_block_elements * 8,
            ..NttConfig::default()
        };
        let inner = match kind {
            0 => PowerOfTwoStrategy::Simple(SimpleStrategy::new(Arc::clone(&ctx))),
            1 => PowerOfTwoStrategy::SixStep(SixStepStrategy::new(Arc::clone(&ctx), &config)),
            _ => PowerOfTwoStrategy::TwoPass(TwoPassStrategy::new(Arc::clone(&ctx), &config)),
        };
        Factor3Strategy::new(inner, ctx, &config)
    }

    #[test]
    fn round_trip_every_inner_strategy() {
        for kind in 0..3 {
            let mut s = wrapped(kind, 8);
            for modulus in 0..MODULUS_COUNT {
                for length in [3usize, 6, 12, 24, 96, 384] {
                    let input: Vec<u64> = (0..length as u64).map(|i| i * 31_337 + 2).collect();
                    let storage = DataStorage::from_vec(input.clone()).unwrap();
                    s.transform(&storage, modulus).unwrap();
                    s.inverse_transform(&storage, modulus, length).unwrap();
                    assert_eq!(storage.to_vec().unwrap(), input, "kind {kind} length {length}");
                }
            }
        }
    }

    #[test]
    fn power_of_two_length_delegates() {
        let mut s = wrapped(0, 1 << 20);
        let m = Modulus::of_set(0);
        let a = [1, 2, 3];
        let b = [4, 5];
        assert_eq!(
            convolve_with(&mut s, &a, &b, 8, 0),
            cyclic_convolution(&a, &b, 8, &m)
        );
    }

    #[test]
    fn length_three_is_a_plain_dft() {
        let mut s = wrapped(0, 1 << 20);
        let m = Modulus::of_set(2);
        let storage = DataStorage::from_vec(vec![1, 2, 3]).unwrap();
        s.transform(&storage, 2).unwrap();
        let w = m.forward_root(3).unwrap();
        let expected: Vec<u64> = (0..3u64)
            .map(|k| {
                (0..3u64).fold(0, |acc, j| m.add(acc, m.mul(j + 1, m.pow(w, j * k))))
            })
            .collect();
        assert_eq!(storage.to_vec().unwrap(), expected);
    }

    #[test]
    fn other_lengths_rejected() {
        let mut s = wrapped(0, 1 << 20);
        let storage = DataStorage::memory(10).unwrap();
        assert!(matches!(
            s.transform(&storage, 0),
            Err(NttError::Configuration(_))
        ));
    }

    #[test]
    fn works_on_disk_storage() {
        use ntmul_storage::file::MemFile;
        use ntmul_storage::StorageConfig;

        let config = StorageConfig {
            block_size_bytes: 64,
            cache_blocks: 3,
            ..StorageConfig::default()
        };
        let input: Vec<u64> = (0..192).map(|i| i * 5 + 9).collect();
        let storage = DataStorage::disk(192, Box::new(MemFile::new()), &config).unwrap();
        storage.write_from(0, &input).unwrap();
        let mut s = wrapped(2, 16);
        s.transform(&storage, 1).unwrap();
        s.inverse_transform(&storage, 1, 192).unwrap();
        assert_eq!(storage.to_vec().unwrap(), input);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn convolution_matches_schoolbook(
            a in prop::collection::vec(0u64..1 << 40, 1..20),
            b in prop::collection::vec(0u64..1 << 40, 1..20),
            kind in 0usize..3,
            modulus in 0usize..MODULUS_COUNT,
        ) {
            let power2 = (a.len() + b.len()).next_power_of_two();
            let length = if 3 * power2 / 4 >= a.len() + b.len() { 3 * power2 / 4 } else { 3 * power2 };
            let mut s = wrapped(kind, 4);
            let m = Modulus::of_set(modulus);
            prop_assert_eq!(
                convolve_with(&mut s, &a, &b, length, modulus),
                cyclic_convolution(&a, &b, length, &m)
            );
        }
    }
}
