//! Six-step transform over one in-memory access.
//!
//! The array is viewed as an `n1 × n2` matrix. Columns are transformed as rows
//! of the transposed matrix, twiddle factors are applied, then rows are
//! transformed. The closing transpose is skipped in both directions: the
//! forward output is in a scrambled order that only the matching inverse reads.

use std::sync::Arc;

use ntmul_storage::{AccessMode, DataStorage};

use crate::config::NttConfig;
use crate::context::NttContext;
use crate::error::NttError;
use crate::matrix::MatrixStrategy;
use crate::step::NttStepStrategy;
use crate::strategy::{power_of_two_length, split_length, NttStrategy};

/// In-memory six-step transform.
#[derive(Debug)]
pub struct SixStepStrategy {
    step: NttStepStrategy,
    matrix: MatrixStrategy,
}

impl SixStepStrategy {
    /// Create a six-step strategy; the transpose tile follows the cache burst.
    #[must_use]
    pub fn new(ctx: Arc<NttContext>, config: &NttConfig) -> Self {
        Self {
            step: NttStepStrategy::new(ctx),
            matrix: MatrixStrategy::new(config.burst_elements()),
        }
    }

    fn forward(&mut self, data: &mut [u64], modulus: usize) -> Result<(), NttError> {
        let length = data.len();
        let (n1, n2) = split_length(length);
        self.matrix.transpose(data, n1, n2)?;
        self.step.transform_rows(data, n1, n2, false, true, modulus)?;
        self.matrix.transpose(data, n2, n1)?;
        self.step
            .multiply_elements(data, 0, 0, n1, n2, length, 1, false, modulus)?;
        self.step.transform_rows(data, n2, n1, false, false, modulus)
    }

    fn inverse(&mut self, data: &mut [u64], modulus: usize, total_length: usize) -> Result<(), NttError> {
        let length = data.len();
        let (n1, n2) = split_length(length);
        self.step.transform_rows(data, n2, n1, true, false, modulus)?;
        self.step
            .multiply_elements(data, 0, 0, n1, n2, length, total_length, true, modulus)?;
        self.matrix.transpose(data, n1, n2)?;
        self.step.transform_rows(data, n1, n2, true, true, modulus)?;
        self.matrix.transpose(data, n2, n1)
    }
}

impl NttStrategy for SixStepStrategy {
    fn transform(&mut self, storage: &DataStorage, modulus: usize) -> Result<(), NttError> {
        let length = power_of_two_length(storage)?;
        let mut access = storage.access(AccessMode::ReadWrite, 0, length)?;
        self.forward(access.data_mut()?, modulus)?;
        access.close()?;
        Ok(())
    }

    fn inverse_transform(
        &mut self,
        storage: &DataStorage,
        modulus: usize,
        total_length: usize,
    ) -> Result<(), NttError> {
        let length = power_of_two_length(storage)?;
        let mut access = storage.access(AccessMode::ReadWrite, 0, length)?;
        self.inverse(access.data_mut()?, modulus, total_length)?;
        access.close()?;
        Ok(())
    }
}
