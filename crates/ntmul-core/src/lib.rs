//! # ntmul-core
//!
//! Large-integer multiplication by number-theoretic convolution.
//!
//! A [`ConvolutionEngine`] multiplies digit sequences in a fixed element base.
//! Each operand is transformed modulo three primes, the transforms are
//! multiplied pointwise, and the three cyclic convolutions are combined by a
//! block-parallel carry-CRT pass into digits of the base.

pub mod base_math;
pub mod config;
pub mod convolution;
pub mod crt;
pub mod error;
pub mod interop;
pub mod radix;

// Re-exports
pub use base_math::{normalize, BaseMath};
pub use config::EngineConfig;
pub use convolution::ConvolutionEngine;
pub use crt::{CarryCrt, CarryState, CrtConstants, Spill};
pub use error::EngineError;
pub use radix::RadixConstants;

/// Multiply two number strings in `radix` with default settings.
///
/// # Example
/// ```
/// let product = ntmul_core::multiply_numbers("123456789", "987654321", 10).unwrap();
/// assert_eq!(product, "121932631112635269");
/// ```
pub fn multiply_numbers(a: &str, b: &str, radix: u32) -> Result<String, EngineError> {
    let constants = RadixConstants::new(radix)?;
    let engine = ConvolutionEngine::new(constants.base, EngineConfig::default())?;
    let x = interop::parse_digits(a, &constants)?;
    let y = interop::parse_digits(b, &constants)?;
    let product = engine.multiply(&x, &y)?;
    interop::format_digits(&product, &constants)
}
