//! # ntmul-ntt
//!
//! Number-theoretic transforms modulo three fixed 64-bit primes.
//!
//! [`selector::plan`] picks a strategy for a transform length and
//! [`selector::build`] turns the plan into a [`TransformStrategy`]: a simple
//! transform for cache-sized lengths, the six-step transform for lengths that
//! fit one memory block, and the two-pass transform beyond that, optionally
//! wrapped in the factor-3 extension for lengths `3·2^k`.

pub mod config;
pub mod context;
pub mod error;
pub mod factor3;
pub mod matrix;
pub mod modmath;
pub mod selector;
pub mod simple;
pub mod six_step;
pub mod step;
pub mod strategy;
pub mod two_pass;

// Re-exports
pub use config::NttConfig;
pub use context::NttContext;
pub use error::NttError;
pub use modmath::{Modulus, MODULI, MODULUS_COUNT};
pub use selector::{StrategyKind, StrategyPlan};
pub use strategy::{NttStrategy, PowerOfTwoStrategy, TransformStrategy};
