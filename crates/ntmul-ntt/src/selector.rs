//! Transform strategy selection.
//!
//! [`plan`] is a pure function of the transform length and the cache and
//! memory settings; [`build`] turns a plan into strategy objects.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::NttConfig;
use crate::context::NttContext;
use crate::error::NttError;
use crate::factor3::Factor3Strategy;
use crate::modmath::MAX_TRANSFORM_LENGTH;
use crate::simple::SimpleStrategy;
use crate::six_step::SixStepStrategy;
use crate::strategy::{PowerOfTwoStrategy, TransformStrategy};
use crate::two_pass::TwoPassStrategy;

/// The power-of-two strategy family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// One row transform over the whole array.
    Simple,
    /// In-memory six-step transform.
    SixStep,
    /// Blocked two-pass transform.
    TwoPass,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Simple => "simple",
            Self::SixStep => "six-step",
            Self::TwoPass => "two-pass",
        };
        f.write_str(name)
    }
}

/// The strategy chosen for one transform length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyPlan {
    /// Strategy used for the power-of-two factor.
    pub kind: StrategyKind,
    /// Whether the factor-3 extension wraps the strategy.
    pub factor3: bool,
    /// Transform length.
    pub length: usize,
    /// Power-of-two factor of the length.
    pub power2_length: usize,
}

/// Smallest `2^k` or `3·2^k` that is at least `n` (and at least 1).
#[must_use]
pub fn round23up(n: usize) -> usize {
    let n = n.max(1);
    let p = n.next_power_of_two();
    if p >= 4 && 3 * (p / 4) >= n {
        3 * (p / 4)
    } else {
        p
    }
}

/// Transform length needed for a linear convolution producing `size` coefficients.
pub fn transform_length(size: usize) -> Result<usize, NttError> {
    if size > MAX_TRANSFORM_LENGTH {
        return Err(NttError::Capacity {
            requested: size,
            limit: MAX_TRANSFORM_LENGTH,
        });
    }
    Ok(round23up(size))
}

/// Choose the strategy for a transform of `length` elements.
pub fn plan(length: usize, config: &NttConfig) -> Result<StrategyPlan, NttError> {
    if length > MAX_TRANSFORM_LENGTH {
        return Err(NttError::Capacity {
            requested: length,
            limit: MAX_TRANSFORM_LENGTH,
        });
    }
    let power2_length = length & length.wrapping_neg();
    let factor3 = length != power2_length;
    if length == 0 || (factor3 && length != 3 * power2_length) {
        return Err(NttError::Configuration(format!(
            "transform length {length} is neither 2^k nor 3·2^k"
        )));
    }
    let kind = if power2_length <= config.cache_elements() / 2 {
        StrategyKind::Simple
    } else if power2_length <= config.max_block_elements() && power2_length <= config.max_array_len {
        StrategyKind::SixStep
    } else {
        StrategyKind::TwoPass
    };
    let plan = StrategyPlan {
        kind,
        factor3,
        length,
        power2_length,
    };
    debug!(%kind, factor3, length, power2_length, "selected transform strategy");
    Ok(plan)
}

/// Build the strategy objects for `plan`.
#[must_use]
pub fn build(plan: &StrategyPlan, ctx: &Arc<NttContext>, config: &NttConfig) -> TransformStrategy {
    let inner = match plan.kind {
        StrategyKind::Simple => PowerOfTwoStrategy::Simple(SimpleStrategy::new(Arc::clone(ctx))),
        StrategyKind::SixStep => {
            PowerOfTwoStrategy::SixStep(SixStepStrategy::new(Arc::clone(ctx), config))
        }
        StrategyKind::TwoPass => {
            PowerOfTwoStrategy::TwoPass(TwoPassStrategy::new(Arc::clone(ctx), config))
        }
    };
    if plan.factor3 {
        TransformStrategy::Factor3(Factor3Strategy::new(inner, Arc::clone(ctx), config))
    } else {
        TransformStrategy::PowerOfTwo(inner)
    }
}
