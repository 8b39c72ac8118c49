//! Shared helpers for the workspace integration tests.

use std::path::Path;

use num_bigint::BigUint;

use ntmul_core::interop::{format_digits, parse_digits};
use ntmul_core::{ConvolutionEngine, EngineConfig, EngineError, RadixConstants};

/// Settings that steer small operands onto each transform strategy.
///
/// The two-pass settings also push scratch storage onto disk under `dir`.
#[must_use]
pub fn strategy_configs(dir: &Path) -> Vec<(&'static str, EngineConfig)> {
    let mut simple = EngineConfig::default();
    simple.schoolbook_max_elements = 0;

    let mut six_step = simple.clone();
    six_step.ntt.cache_l1_bytes = 512;
    six_step.ntt.cache_burst_bytes = 32;

    let mut two_pass = six_step.clone();
    two_pass.ntt.max_memory_block_bytes = 1 << 10;
    two_pass.storage.memory_threshold_bytes = 4 << 10;
    two_pass.storage.block_size_bytes = 256;
    two_pass.storage.cache_blocks = 4;
    two_pass.storage.temp_dir = Some(dir.to_path_buf());
    two_pass.crt_block_elements = 100;

    vec![("simple", simple), ("six-step", six_step), ("two-pass", two_pass)]
}

/// `a · b` (or `a²` without `b`) as a number string in the radix of `radix`.
pub fn multiply_strings(
    engine: &ConvolutionEngine,
    radix: &RadixConstants,
    a: &str,
    b: Option<&str>,
) -> Result<String, EngineError> {
    let x = parse_digits(a, radix)?;
    let product = match b {
        Some(b) => engine.multiply(&x, &parse_digits(b, radix)?)?,
        None => engine.square(&x)?,
    };
    format_digits(&product, radix)
}

/// `base^exp` as a number string in `radix`.
#[must_use]
pub fn power_string(base: u32, exp: u32, radix: u32) -> String {
    BigUint::from(base).pow(exp).to_str_radix(radix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configs_are_valid() {
        let dir = std::env::temp_dir();
        for (name, config) in strategy_configs(&dir) {
            assert!(config.validate().is_ok(), "{name}");
        }
    }

    #[test]
    fn power_strings() {
        assert_eq!(power_string(2, 10, 10), "1024");
        assert_eq!(power_string(2, 8, 16), "100");
    }
}
