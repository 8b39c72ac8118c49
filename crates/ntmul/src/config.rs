//! Application configuration from CLI flags and environment.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use ntmul_core::config::parse_size;
use ntmul_core::EngineConfig;

/// ntmul: multiply large integers with number-theoretic transforms.
#[derive(Parser, Debug)]
#[command(name = "ntmul", version, about)]
#[allow(clippy::struct_excessive_bools)]
pub struct AppConfig {
    /// First operand.
    pub a: Option<String>,

    /// Second operand (defaults to the first).
    pub b: Option<String>,

    /// Radix of operands and result (2 to 36).
    #[arg(short, long, default_value = "10", env = "NTMUL_RADIX")]
    pub radix: u32,

    /// Square the first operand.
    #[arg(short, long)]
    pub square: bool,

    /// Print only the most significant digits of the product.
    #[arg(long)]
    pub result_digits: Option<usize>,

    /// Engine settings file (JSON).
    #[arg(long, env = "NTMUL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Worker threads (0 = one per core).
    #[arg(long, default_value = "0", env = "NTMUL_THREADS")]
    pub threads: usize,

    /// Largest in-memory transform block (e.g. "64M").
    #[arg(long, env = "NTMUL_MEMORY_BLOCK")]
    pub memory_block: Option<String>,

    /// Scratch storage above this size goes to disk (e.g. "1G").
    #[arg(long, env = "NTMUL_MEMORY_THRESHOLD")]
    pub memory_threshold: Option<String>,

    /// Directory for scratch files.
    #[arg(long, env = "NTMUL_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Print the transform plan for a convolution of this many coefficients and exit.
    #[arg(long)]
    pub plan: Option<usize>,

    /// Cross-check random operands of this many digits against num-bigint and exit.
    #[arg(long)]
    pub self_test: Option<usize>,

    /// Seed for the self-test operands.
    #[arg(long, default_value = "1")]
    pub seed: u64,

    /// Print the effective engine settings as JSON and exit.
    #[arg(long)]
    pub dump_config: bool,

    /// Output file path for the product.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode (only output the number).
    #[arg(short, long)]
    pub quiet: bool,
}

impl AppConfig {
    /// Parse CLI arguments.
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Engine settings: the settings file or detected defaults, then flag overrides.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            None => EngineConfig::detect(),
        };
        if let Some(size) = &self.memory_block {
            config.ntt.max_memory_block_bytes = parse_size(size).map_err(anyhow::Error::msg)?;
        }
        if let Some(size) = &self.memory_threshold {
            config.storage.memory_threshold_bytes = parse_size(size).map_err(anyhow::Error::msg)?;
        }
        if let Some(dir) = &self.temp_dir {
            config.storage.temp_dir = Some(dir.clone());
        }
        config.validate()?;
        Ok(config)
    }
}
