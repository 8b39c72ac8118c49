//! The convolution engine: digit sequences in, their product out.
//!
//! Both operands are copied into scratch storage of the transform length,
//! transformed modulo each of the three primes in parallel, multiplied
//! pointwise and inverse-transformed. The three residue sequences are then
//! combined by the carry-CRT pass into digits of the element base.
//!
//! Products with a short operand skip all of that and are computed by
//! schoolbook multiply-add.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use ntmul_ntt::selector::{self, transform_length};
use ntmul_ntt::step::NttStepStrategy;
use ntmul_ntt::{NttContext, NttStrategy, StrategyPlan, MODULUS_COUNT};
use ntmul_storage::stats::CacheStats;
use ntmul_storage::{AccessMode, DataStorage, StorageFactory};

use crate::base_math::BaseMath;
use crate::config::EngineConfig;
use crate::crt::{self, CrtConstants};
use crate::error::EngineError;
use crate::radix::RadixConstants;

/// Elements per window when scanning or streaming a whole storage.
const STREAM_ELEMENTS: usize = 1 << 16;

/// Multiplies digit sequences of one base through number-theoretic transforms.
///
/// Settings are fixed when the engine is built. The engine itself is shared
/// freely; every call builds its own per-modulus strategy objects.
#[derive(Debug)]
pub struct ConvolutionEngine {
    config: EngineConfig,
    ctx: Arc<NttContext>,
    factory: StorageFactory,
    constants: Arc<CrtConstants>,
    math: BaseMath,
}

impl ConvolutionEngine {
    /// Engine for digits in `base`.
    pub fn new(base: u64, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let ctx = Arc::new(NttContext::default());
        let constants = Arc::new(CrtConstants::new(ctx.moduli(), base)?);
        Ok(Self {
            factory: StorageFactory::new(config.storage.clone()),
            math: BaseMath::new(base)?,
            config,
            ctx,
            constants,
        })
    }

    /// Engine for the element base of `radix`.
    pub fn for_radix(radix: u32, config: EngineConfig) -> Result<Self, EngineError> {
        Self::new(RadixConstants::new(radix)?.base, config)
    }

    /// The element base.
    #[must_use]
    pub fn base(&self) -> u64 {
        self.math.base()
    }

    /// Settings the engine was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The shared transform context.
    #[must_use]
    pub fn context(&self) -> &Arc<NttContext> {
        &self.ctx
    }

    /// Root table cache statistics.
    #[must_use]
    pub fn table_stats(&self) -> CacheStats {
        self.ctx.tables().stats()
    }

    /// Check if operands of `x_len` and `y_len` elements are multiplied
    /// without transforms.
    #[must_use]
    pub fn uses_schoolbook(&self, x_len: usize, y_len: usize) -> bool {
        x_len.min(y_len) <= self.config.schoolbook_max_elements.max(1)
    }

    /// The transform plan for operands of `x_len` and `y_len` elements.
    pub fn plan(&self, x_len: usize, y_len: usize) -> Result<StrategyPlan, EngineError> {
        let size = (x_len + y_len).saturating_sub(1).max(1);
        Ok(selector::plan(transform_length(size)?, &self.config.ntt)?)
    }

    /// The most significant `result_size` digits of `x · y`.
    ///
    /// The full product has `x.len() + y.len()` digits, the first of which may
    /// be zero.
    pub fn convolve(
        &self,
        x: &DataStorage,
        y: &DataStorage,
        result_size: usize,
    ) -> Result<DataStorage, EngineError> {
        self.run(x, Some(y), result_size)
    }

    /// The most significant `result_size` digits of `x²`, transforming `x` once.
    pub fn autoconvolve(&self, x: &DataStorage, result_size: usize) -> Result<DataStorage, EngineError> {
        self.run(x, None, result_size)
    }

    /// Full product of two digit slices.
    pub fn multiply(&self, x: &[u64], y: &[u64]) -> Result<Vec<u64>, EngineError> {
        self.multiply_truncated(x, y, x.len() + y.len())
    }

    /// The most significant `result_size` digits of the product of two digit slices.
    pub fn multiply_truncated(
        &self,
        x: &[u64],
        y: &[u64],
        result_size: usize,
    ) -> Result<Vec<u64>, EngineError> {
        let xs = DataStorage::from_vec(x.to_vec())?.read_only();
        let ys = DataStorage::from_vec(y.to_vec())?.read_only();
        Ok(self.convolve(&xs, &ys, result_size)?.to_vec()?)
    }

    /// Full square of a digit slice.
    pub fn square(&self, x: &[u64]) -> Result<Vec<u64>, EngineError> {
        self.square_truncated(x, 2 * x.len())
    }

    /// The most significant `result_size` digits of the square of a digit slice.
    pub fn square_truncated(&self, x: &[u64], result_size: usize) -> Result<Vec<u64>, EngineError> {
        let xs = DataStorage::from_vec(x.to_vec())?.read_only();
        Ok(self.autoconvolve(&xs, result_size)?.to_vec()?)
    }

    fn run(
        &self,
        x: &DataStorage,
        y: Option<&DataStorage>,
        result_size: usize,
    ) -> Result<DataStorage, EngineError> {
        let x_len = x.len();
        let y_len = y.map_or(x_len, DataStorage::len);
        if x_len == 0 || y_len == 0 {
            return Err(EngineError::configuration("cannot multiply an empty digit sequence"));
        }
        let full = x_len + y_len;
        if result_size == 0 || result_size > full {
            return Err(EngineError::configuration(format!(
                "result size {result_size} outside 1..={full}"
            )));
        }
        self.check_digits(x)?;
        if let Some(y) = y {
            self.check_digits(y)?;
        }

        if self.uses_schoolbook(x_len, y_len) {
            let (long, short) = match y {
                Some(y) if y_len <= x_len => (x, y),
                Some(y) => (y, x),
                None => (x, x),
            };
            debug!(long = long.len(), short = short.len(), result_size, "schoolbook");
            return self.multiply_short(long, &short.to_vec()?, result_size);
        }

        self.constants.check_headroom(x_len, y_len)?;
        let size = full - 1;
        let length = transform_length(size)?;
        let plan = selector::plan(length, &self.config.ntt)?;
        info!(
            x_len,
            y_len,
            result_size,
            length,
            kind = %plan.kind,
            factor3 = plan.factor3,
            square = y.is_none(),
            "convolution"
        );

        let residues = (0..MODULUS_COUNT)
            .into_par_iter()
            .map(|modulus| self.residues(&plan, x, y, modulus))
            .collect::<Result<Vec<_>, _>>()?;
        let [r0, r1, r2]: [DataStorage; MODULUS_COUNT] = residues
            .try_into()
            .map_err(|_| EngineError::internal("expected one residue sequence per modulus"))?;

        let dst = self.factory.create(result_size)?;
        let blocks = crt::partition(size, self.config.crt_block_elements);
        crt::reconstruct(&self.constants, [&r0, &r1, &r2], &dst, size, &blocks)?;
        Ok(dst)
    }

    /// Cyclic convolution of `x` and `y` (or `x` with itself) modulo one prime.
    fn residues(
        &self,
        plan: &StrategyPlan,
        x: &DataStorage,
        y: Option<&DataStorage>,
        modulus: usize,
    ) -> Result<DataStorage, EngineError> {
        let mut strategy = selector::build(plan, &self.ctx, &self.config.ntt);
        let mut step = NttStepStrategy::new(Arc::clone(&self.ctx));
        let length = plan.length;

        let a = self.factory.create(length)?;
        a.copy_from(x, x.len())?;
        strategy.transform(&a, modulus)?;
        debug!(modulus, "forward transform done");

        let b = match y {
            Some(y) => {
                let b = self.factory.create(length)?;
                b.copy_from(y, y.len())?;
                strategy.transform(&b, modulus)?;
                Some(b)
            }
            None => None,
        };

        let block = self.config.ntt.max_block_elements();
        for offset in (0..length).step_by(block) {
            let len = block.min(length - offset);
            let mut dst = a.access(AccessMode::ReadWrite, offset, len)?;
            match &b {
                Some(b) => {
                    let src = b.access(AccessMode::Read, offset, len)?;
                    step.multiply_in_place(dst.data_mut()?, src.data()?, modulus)?;
                }
                None => step.square_in_place(dst.data_mut()?, modulus)?,
            }
            dst.close()?;
        }
        drop(b);

        strategy.inverse_transform(&a, modulus, length)?;
        debug!(modulus, "inverse transform done");
        Ok(a)
    }

    /// `long · short` by schoolbook multiply-add: one pass over `long` per digit
    /// of `short`, each streaming from the least significant end.
    ///
    /// The row of `short[j]` covers product positions `j..=j + long.len()`;
    /// position `j` is untouched by earlier rows and takes the row's carry.
    fn multiply_short(
        &self,
        long: &DataStorage,
        short: &[u64],
        result_size: usize,
    ) -> Result<DataStorage, EngineError> {
        let full = self.factory.create(long.len() + short.len())?;
        let mut partial = vec![0; STREAM_ELEMENTS.min(long.len())];
        for (row, &digit) in short.iter().enumerate().rev() {
            let mut carry = 0;
            let mut end = long.len();
            while end > 0 {
                let begin = end.saturating_sub(STREAM_ELEMENTS);
                let len = end - begin;
                let src = long.access(AccessMode::Read, begin, len)?;
                let mut dst = full.access(AccessMode::ReadWrite, row + begin + 1, len)?;
                partial[..len].copy_from_slice(dst.data()?);
                carry = self.math.multiply_add(
                    src.data()?,
                    Some(&partial[..len]),
                    digit,
                    carry,
                    dst.data_mut()?,
                )?;
                dst.close()?;
                end = begin;
            }
            full.write_from(row, &[carry])?;
        }
        if result_size == full.len() {
            return Ok(full);
        }
        let dst = self.factory.create(result_size)?;
        dst.copy_from(&full, result_size)?;
        Ok(dst)
    }

    fn check_digits(&self, storage: &DataStorage) -> Result<(), EngineError> {
        let base = self.base();
        for offset in (0..storage.len()).step_by(STREAM_ELEMENTS) {
            let len = STREAM_ELEMENTS.min(storage.len() - offset);
            let access = storage.access(AccessMode::Read, offset, len)?;
            if let Some(i) = access.data()?.iter().position(|&d| d >= base) {
                return Err(EngineError::InvalidDigit {
                    position: offset + i,
                    value: access.data()?[i],
                    base,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use proptest::prelude::*;

    use super::*;
    use crate::base_math::normalize;
    use crate::interop::{from_biguint_base, to_biguint_base};

    fn engine(base: u64) -> ConvolutionEngine {
        ConvolutionEngine::new(base, EngineConfig::default()).unwrap()
    }

    /// Engine that transforms every operand longer than one element.
    fn transform_engine(base: u64) -> ConvolutionEngine {
        let mut config = EngineConfig::default();
        config.schoolbook_max_elements = 0;
        ConvolutionEngine::new(base, config).unwrap()
    }

    /// Engine whose settings force the six-step and two-pass strategies onto
    /// disk storage for small operands.
    fn out_of_core_engine(base: u64, dir: &std::path::Path) -> ConvolutionEngine {
        let mut config = EngineConfig::default();
        config.ntt.cache_l1_bytes = 256;
        config.ntt.cache_burst_bytes = 16;
        config.ntt.max_memory_block_bytes = 512;
        config.storage.memory_threshold_bytes = 256;
        config.storage.block_size_bytes = 128;
        config.storage.cache_blocks = 4;
        config.storage.temp_dir = Some(dir.to_path_buf());
        config.crt_block_elements = 5;
        config.schoolbook_max_elements = 0;
        ConvolutionEngine::new(base, config).unwrap()
    }

    fn expected(x: &[u64], y: &[u64], base: u64) -> Vec<u64> {
        let product = to_biguint_base(x, base) * to_biguint_base(y, base);
        from_biguint_base(&product, base, x.len() + y.len()).unwrap()
    }

    #[test]
    fn power_of_ten_squared_normalizes_to_one_and_zeros() {
        let e = engine(1_000_000_000);
        let x = [1, 0, 0, 0];
        let mut product = e.multiply(&x, &x).unwrap();
        assert_eq!(product, vec![0, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(normalize(&mut product), 1);
        assert_eq!(product, vec![1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn small_products() {
        for e in [engine(10), transform_engine(10)] {
            assert_eq!(e.multiply(&[9, 9], &[9, 9]).unwrap(), vec![9, 8, 0, 1]);
            assert_eq!(e.multiply(&[1, 2], &[3, 4]).unwrap(), vec![0, 4, 0, 8]);
            assert_eq!(e.multiply(&[7], &[6]).unwrap(), vec![4, 2]);
            assert_eq!(e.multiply(&[9, 9, 9], &[9]).unwrap(), vec![8, 9, 9, 1]);
            assert_eq!(e.multiply(&[9], &[9, 9, 9]).unwrap(), vec![8, 9, 9, 1]);
            assert_eq!(e.square(&[1, 1]).unwrap(), vec![0, 1, 2, 1]);
            assert_eq!(e.square_truncated(&[1, 1], 3).unwrap(), vec![0, 1, 2]);
        }
    }

    #[test]
    fn short_operands_skip_transforms() {
        let e = engine(10);
        assert!(e.uses_schoolbook(1, 1_000));
        assert!(e.uses_schoolbook(500, 8));
        assert!(!e.uses_schoolbook(9, 9));
        assert!(transform_engine(10).uses_schoolbook(1, 2));
        assert!(!transform_engine(10).uses_schoolbook(2, 2));

        // no headroom limit on the schoolbook path
        let nines = e.multiply(&[9; 6], &[9; 6]).unwrap();
        assert_eq!(nines, vec![9, 9, 9, 9, 9, 8, 0, 0, 0, 0, 0, 1]);
        assert_eq!(e.table_stats().misses, 0);
    }

    #[test]
    fn schoolbook_matches_transforms() {
        let base = 1_000_000_000_000_000_000;
        let (e, t) = (engine(base), transform_engine(base));
        let long: Vec<u64> = (0..300u64).map(|i| i.wrapping_mul(0x9e37_79b9_7f4a_7c15) % base).collect();
        for n in 1..=8 {
            let short: Vec<u64> = (0..n).map(|i| base - 1 - i).collect();
            let want = expected(&long, &short, base);
            assert_eq!(e.multiply(&long, &short).unwrap(), want, "{n} digits");
            assert_eq!(e.multiply(&short, &long).unwrap(), want, "{n} digits");
            assert_eq!(t.multiply(&long, &short).unwrap(), want, "{n} digits");
            assert_eq!(e.multiply_truncated(&short, &long, 5).unwrap(), want[..5].to_vec());
            assert_eq!(e.square(&short).unwrap(), expected(&short, &short, base));
        }
    }

    #[test]
    fn truncated_result_keeps_top_digits() {
        let e = engine(10);
        assert_eq!(e.multiply_truncated(&[9, 9], &[9, 9], 2).unwrap(), vec![9, 8]);
        assert_eq!(e.multiply_truncated(&[9, 9, 9], &[9], 1).unwrap(), vec![8]);
    }

    #[test]
    fn rejects_bad_input() {
        let e = engine(10);
        assert!(matches!(
            e.multiply(&[1, 10], &[1, 2]),
            Err(EngineError::InvalidDigit {
                position: 1,
                value: 10,
                base: 10
            })
        ));
        assert!(e.multiply(&[], &[1]).unwrap_err().is_configuration());
        assert!(e.multiply_truncated(&[1], &[1], 3).unwrap_err().is_configuration());
        assert!(e.multiply_truncated(&[1], &[1], 0).unwrap_err().is_configuration());
        // Twelve transformed product digits do not fit below base 10.
        let t = transform_engine(10);
        assert!(t.multiply(&[9; 6], &[9; 6]).unwrap_err().is_configuration());
    }

    #[test]
    fn factor3_and_simple_lengths() {
        let base = 1_000_000_000_000_000_000;
        let e = transform_engine(base);
        for (xs, ys) in [(2, 2), (3, 4), (7, 6), (12, 13), (100, 90)] {
            let x: Vec<u64> = (0..xs as u64).map(|i| i.wrapping_mul(0x9e37_79b9_7f4a_7c15) % base).collect();
            let y: Vec<u64> = (0..ys as u64).map(|i| i.wrapping_mul(0xc2b2_ae3d_27d4_eb4f).wrapping_add(1) % base).collect();
            assert_eq!(e.multiply(&x, &y).unwrap(), expected(&x, &y, base), "{xs}x{ys}");
        }
        assert!(e.table_stats().misses > 0);
    }

    #[test]
    fn out_of_core_matches_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let base = 1 << 60;
        let disk = out_of_core_engine(base, dir.path());
        let memory = engine(base);
        let x: Vec<u64> = (0..200u64).map(|i| (i * 0x9e37_79b9) % base).collect();
        let y: Vec<u64> = (0..150u64).map(|i| base - 1 - i).collect();
        assert_eq!(disk.plan(200, 150).unwrap().kind, ntmul_ntt::StrategyKind::TwoPass);
        let product = disk.multiply(&x, &y).unwrap();
        assert_eq!(product, memory.multiply(&x, &y).unwrap());
        assert_eq!(product, expected(&x, &y, base));
        assert_eq!(disk.square(&x).unwrap(), expected(&x, &x, base));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn autoconvolution_matches_convolution() {
        let e = engine(1_000_000_000);
        let x: Vec<u64> = (0..33u64).map(|i| i * 30_000_001 % 1_000_000_000).collect();
        assert_eq!(e.square(&x).unwrap(), e.multiply(&x, &x).unwrap());
    }

    #[test]
    fn for_radix_uses_radix_base() {
        let e = ConvolutionEngine::for_radix(10, EngineConfig::default()).unwrap();
        assert_eq!(e.base(), 1_000_000_000_000_000_000);
        assert!(ConvolutionEngine::for_radix(40, EngineConfig::default()).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn matches_biguint(
            x in prop::collection::vec(0u64..1_000_000_000_000_000_000, 1..40),
            y in prop::collection::vec(0u64..1_000_000_000_000_000_000, 1..40),
        ) {
            let base = 1_000_000_000_000_000_000;
            let e = engine(base);
            prop_assert_eq!(e.multiply(&x, &y).unwrap(), expected(&x, &y, base));
        }

        #[test]
        fn truncation_is_a_prefix(
            x in prop::collection::vec(0u64..1 << 32, 2..20),
            y in prop::collection::vec(0u64..1 << 32, 2..20),
            keep in 1usize..40,
        ) {
            let e = engine(1 << 32);
            let full = e.multiply(&x, &y).unwrap();
            let keep = keep.min(full.len());
            prop_assert_eq!(e.multiply_truncated(&x, &y, keep).unwrap(), full[..keep].to_vec());
        }
    }

    #[test]
    fn biguint_helpers_agree() {
        let value = BigUint::from(10u32).pow(40);
        let digits = from_biguint_base(&value, 1_000_000_000, 5).unwrap();
        assert_eq!(digits, vec![10_000, 0, 0, 0, 0]);
    }
}
