//! Application entry point and dispatch.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use num_bigint::BigUint;

use ntmul_core::interop::{format_digits, parse_digits, to_biguint};
use ntmul_core::{ConvolutionEngine, EngineConfig, EngineError, RadixConstants};
use ntmul_ntt::{selector, NttError};

use crate::config::AppConfig;
use crate::version::full_version;

/// Run the application.
pub fn run(config: &AppConfig) -> Result<()> {
    if config.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build_global()
            .context("configuring the worker pool")?;
    }
    if config.verbose && !config.quiet {
        eprintln!("{}", full_version());
    }

    let settings = config.engine_config()?;

    if config.dump_config {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    if let Some(size) = config.plan {
        return run_plan(size, &settings);
    }

    let radix = RadixConstants::new(config.radix)?;
    let engine = ConvolutionEngine::new(radix.base, settings)?;

    if let Some(digits) = config.self_test {
        return run_self_test(&engine, &radix, digits, config);
    }

    run_multiply(&engine, &radix, config)
}

fn run_plan(size: usize, settings: &EngineConfig) -> Result<()> {
    let length = selector::transform_length(size).map_err(EngineError::from)?;
    let plan = selector::plan(length, &settings.ntt).map_err(EngineError::from)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn run_multiply(engine: &ConvolutionEngine, radix: &RadixConstants, config: &AppConfig) -> Result<()> {
    let a = config.a.as_deref().context("missing operand")?;
    let x = parse_digits(a, radix).context("parsing the first operand")?;
    let y = match (&config.b, config.square) {
        (Some(_), true) => anyhow::bail!("--square takes a single operand"),
        (Some(b), false) => Some(parse_digits(b, radix).context("parsing the second operand")?),
        (None, _) => None,
    };
    let y_len = y.as_ref().map_or(x.len(), Vec::len);
    let full = x.len() + y_len;
    let keep = config
        .result_digits
        .map_or(full, |digits| (radix.elements_for_digits(digits) + 2).min(full));

    let start = Instant::now();
    let product = match &y {
        Some(y) => engine.multiply_truncated(&x, y, keep)?,
        None => engine.square_truncated(&x, keep)?,
    };
    let elapsed = start.elapsed();

    let mut text = format_digits(&product, radix)?;
    if let Some(digits) = config.result_digits {
        text.truncate(digits);
    }

    if !config.quiet {
        eprintln!("{}", summary(engine, x.len(), y_len, text.len(), elapsed)?);
    }
    if config.verbose {
        let tables = engine.table_stats();
        eprintln!(
            "Root tables: {} computed, {:.0}% reused",
            tables.misses,
            100.0 * tables.hit_rate()
        );
    }
    match &config.output {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("writing the product to {}", path.display()))?;
            if !config.quiet {
                eprintln!("Product written to {}", path.display());
            }
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn summary(
    engine: &ConvolutionEngine,
    x_len: usize,
    y_len: usize,
    digits: usize,
    elapsed: Duration,
) -> Result<String> {
    if x_len.min(y_len) == 1 {
        return Ok(format!("{digits} digits in {elapsed:.3?} (single-element multiply)"));
    }
    if engine.uses_schoolbook(x_len, y_len) {
        return Ok(format!("{digits} digits in {elapsed:.3?} (schoolbook multiply)"));
    }
    let plan = engine.plan(x_len, y_len)?;
    let factor3 = if plan.factor3 { ", factor-3" } else { "" };
    Ok(format!(
        "{digits} digits in {elapsed:.3?} ({}{factor3}, transform length {})",
        plan.kind, plan.length
    ))
}

fn run_self_test(
    engine: &ConvolutionEngine,
    radix: &RadixConstants,
    digits: usize,
    config: &AppConfig,
) -> Result<()> {
    let mut rng = SplitMix64(config.seed);
    let a = random_number(&mut rng, radix.radix, digits);
    let b = random_number(&mut rng, radix.radix, digits);
    let x = parse_digits(&a, radix)?;
    let y = parse_digits(&b, radix)?;

    let start = Instant::now();
    let product = engine.multiply(&x, &y)?;
    let square = engine.square(&x)?;
    let elapsed = start.elapsed();

    let want_product = to_biguint(&x, radix)? * to_biguint(&y, radix)?;
    let want_square = to_biguint(&x, radix)?.pow(2);
    check("product", &to_biguint(&product, radix)?, &want_product)?;
    check("square", &to_biguint(&square, radix)?, &want_square)?;

    if !config.quiet {
        println!(
            "Self-test passed: {digits}-digit operands in radix {} ({elapsed:.3?})",
            radix.radix
        );
    }
    Ok(())
}

fn check(what: &str, got: &BigUint, want: &BigUint) -> Result<()> {
    if got != want {
        return Err(EngineError::from(NttError::InternalConsistency(format!(
            "self-test {what} differs from num-bigint"
        )))
        .into());
    }
    Ok(())
}

/// Deterministic operand generator for the self-test.
struct SplitMix64(u64);

impl SplitMix64 {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }
}

/// A `digits`-digit number string in `radix` with a non-zero leading digit.
#[allow(clippy::cast_possible_truncation)]
fn random_number(rng: &mut SplitMix64, radix: u32, digits: usize) -> String {
    (0..digits.max(1))
        .map(|i| {
            let low = u64::from(i == 0);
            let digit = low + rng.next() % (u64::from(radix) - low);
            char::from_digit(digit as u32, radix).unwrap_or('0')
        })
        .collect()
}
