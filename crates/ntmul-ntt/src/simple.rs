//! Single-row transform for lengths that fit the L1 cache.

use std::sync::Arc;

use ntmul_storage::{AccessMode, DataStorage};

use crate::context::NttContext;
use crate::error::NttError;
use crate::step::NttStepStrategy;
use crate::strategy::{power_of_two_length, NttStrategy};

/// Single-row transform of the whole storage, without reordering.
#[derive(Debug)]
pub struct SimpleStrategy {
    step: NttStepStrategy,
}

impl SimpleStrategy {
    /// Create a simple strategy over the given context.
    #[must_use]
    pub fn new(ctx: Arc<NttContext>) -> Self {
        Self {
            step: NttStepStrategy::new(ctx),
        }
    }
}

impl NttStrategy for SimpleStrategy {
    fn transform(&mut self, storage: &DataStorage, modulus: usize) -> Result<(), NttError> {
        let length = power_of_two_length(storage)?;
        let mut access = storage.access(AccessMode::ReadWrite, 0, length)?;
        self.step
            .transform_rows(access.data_mut()?, length, 1, false, false, modulus)?;
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
        let data = access.data_mut()?;
        self.step
            .transform_rows(data, length, 1, true, false, modulus)?;
        self.step.scale(data, total_length, modulus)?;
        access.close()?;
        Ok(())
    }
}
