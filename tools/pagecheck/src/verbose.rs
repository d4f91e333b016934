//! Report verbosity.
//!
//! | Level | Flag | Prints |
//! |-------|------|--------|
//! | Quiet | `-q` | per-file errors and the final summary |
//! | Default | | one summary block per file |
//! | Verbose | `-v` | segment tables, notes, properties, `readelf` output |
//!
//! JSON output ignores the level; it always carries everything.

use std::sync::atomic::{AtomicU8, Ordering};

/// Output verbosity level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet = 0,
    Default = 1,
    Verbose = 2,
}

impl Verbosity {
    /// Maps the `-q` / `-v` flags to a level. `-q` wins.
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, true) => Self::Verbose,
            (false, false) => Self::Default,
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(Verbosity::Default as u8);

/// Sets the process-wide level. Called once from `main`.
pub fn init(level: Verbosity) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Returns the process-wide level.
pub fn level() -> Verbosity {
    match LEVEL.load(Ordering::Relaxed) {
        0 => Verbosity::Quiet,
        2 => Verbosity::Verbose,
        _ => Verbosity::Default,
    }
}

/// Returns `true` if messages at `at` should be printed.
pub fn enabled(at: Verbosity) -> bool {
    level() >= at
}

/// `println!` that only prints with `-v`.
macro_rules! vprintln {
    ($($arg:tt)*) => {
        if $crate::verbose::enabled($crate::verbose::Verbosity::Verbose) {
            println!($($arg)*);
        }
    };
}

pub(crate) use vprintln;

/// `println!` that is silenced by `-q`.
macro_rules! dprintln {
    ($($arg:tt)*) => {
        if $crate::verbose::enabled($crate::verbose::Verbosity::Default) {
            println!($($arg)*);
        }
    };
}

pub(crate) use dprintln;
