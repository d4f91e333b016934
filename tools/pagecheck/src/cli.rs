//! Command-line interface definitions for pagecheck.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use pagecheck_elf::PAGE_SIZE_16K;

/// Check shared libraries for 16 KiB page-size compatibility.
#[derive(Parser)]
#[command(name = "pagecheck", version, about)]
pub struct Cli {
    /// Shared objects to check. Directories are searched recursively for
    /// `*.so` files.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Minimum LOAD segment alignment in bytes (accepts `0x` hex and a `K`
    /// suffix for KiB).
    #[arg(long, default_value_t = PAGE_SIZE_16K, value_parser = parse_size)]
    pub min_align: u64,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Maximum number of parallel workers (0 or omitted = auto-detect from CPU count).
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,

    /// Also list notes with `readelf -n` and report page-size lines it finds.
    #[arg(long)]
    pub readelf: bool,

    /// Suppress per-file output; show only errors and the final summary.
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,

    /// List segments, notes and properties for every file.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

/// Report format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable summary per file.
    Text,
    /// A JSON array with one object per file.
    Json,
}

/// Parses a byte count: decimal, `0x` hex, or a number with a `K`/`KiB`
/// suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let kib = s.strip_suffix("KiB").or_else(|| s.strip_suffix(['K', 'k']));
    let (digits, scale) = match kib {
        Some(n) => (n.trim_end(), 1024),
        None => (s, 1),
    };

    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        digits.parse::<u64>()
    }
    .map_err(|e| format!("invalid size '{s}': {e}"))?;

    let bytes = value
        .checked_mul(scale)
        .ok_or_else(|| format!("size '{s}' is too large"))?;
    if bytes == 0 {
        return Err("size must be non-zero".into());
    }
    Ok(bytes)
}
