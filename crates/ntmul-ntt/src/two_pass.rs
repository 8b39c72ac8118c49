//! Two-pass transform for storages larger than one memory block.
//!
//! Same decomposition as the six-step transform, but the matrix is never held
//! in memory at once. The column pass leases batches of columns through
//! transposed accesses; the row pass leases batches of whole rows. Each pass
//! reads and writes the storage once.

use std::sync::Arc;

use tracing::trace;

use ntmul_storage::{AccessMode, DataStorage};

use crate::config::NttConfig;
use crate::context::NttContext;
use crate::error::NttError;
use crate::step::NttStepStrategy;
use crate::strategy::{power_of_two_length, split_length, NttStrategy};

/// Blocked two-pass transform.
#[derive(Debug)]
pub struct TwoPassStrategy {
    step: NttStepStrategy,
    max_block: usize,
}

impl TwoPassStrategy {
    /// Create a two-pass strategy leasing at most `max_block_elements` at a time.
    #[must_use]
    pub fn new(ctx: Arc<NttContext>, config: &NttConfig) -> Self {
        Self {
            step: NttStepStrategy::new(ctx),
            max_block: config.max_block_elements(),
        }
    }

    /// Number of whole `width`-element lines that fit one block (a power of two
    /// no larger than `limit`).
    fn batch(&self, width: usize, limit: usize) -> usize {
        let lines = (self.max_block / width).max(1);
        (1usize << lines.ilog2()).min(limit)
    }

    fn column_pass(
        &mut self,
        storage: &DataStorage,
        modulus: usize,
        total_length: usize,
        inverse: bool,
    ) -> Result<(), NttError> {
        let length = storage.len();
        let (n1, n2) = split_length(length);
        let batch = self.batch(n1, n2);
        for col in (0..n2).step_by(batch) {
            trace!(col, batch, inverse, "two-pass column batch");
            let mut access = storage.transposed_access(AccessMode::ReadWrite, col, batch, n1)?;
            let data = access.data_mut()?;
            if inverse {
                self.step
                    .multiply_elements(data, col, 0, batch, n1, length, total_length, true, modulus)?;
                self.step.transform_rows(data, n1, batch, true, true, modulus)?;
            } else {
                self.step.transform_rows(data, n1, batch, false, true, modulus)?;
                self.step
                    .multiply_elements(data, col, 0, batch, n1, length, 1, false, modulus)?;
            }
            access.close()?;
        }
        Ok(())
    }

    fn row_pass(&mut self, storage: &DataStorage, modulus: usize, inverse: bool) -> Result<(), NttError> {
        let (n1, n2) = split_length(storage.len());
        let batch = self.batch(n2, n1);
        for row in (0..n1).step_by(batch) {
            trace!(row, batch, inverse, "two-pass row batch");
            let mut access = storage.access(AccessMode::ReadWrite, row * n2, batch * n2)?;
            self.step
                .transform_rows(access.data_mut()?, n2, batch, inverse, false, modulus)?;
            access.close()?;
        }
        Ok(())
    }
}

impl NttStrategy for TwoPassStrategy {
    fn transform(&mut self, storage: &DataStorage, modulus: usize) -> Result<(), NttError> {
        power_of_two_length(storage)?;
        self.column_pass(storage, modulus, 1, false)?;
        self.row_pass(storage, modulus, false)
    }

    fn inverse_transform(
        &mut self,
        storage: &DataStorage,
        modulus: usize,
        total_length: usize,
    ) -> Result<(), NttError> {
        power_of_two_length(storage)?;
        self.row_pass(storage, modulus, true)?;
        self.column_pass(storage, modulus, total_length, true)
    }
}
