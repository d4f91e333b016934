//! Optional cross-check against an external note lister.
//!
//! The built-in parser decides compliance on its own. With `--readelf` the
//! notes are additionally listed by `readelf -n`, and any lines mentioning a
//! page size are attached to the report so the two can be compared. Failure
//! to run the tool is reported, never fatal.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};

/// Something that can render the notes of an ELF file as text.
pub trait NoteLister: Sync {
    /// Short tool name for diagnostics.
    fn name(&self) -> &str;

    /// Returns the textual note listing of `path`.
    fn list_notes(&self, path: &Path) -> Result<String>;
}

/// `readelf -n` from binutils or LLVM.
pub struct Readelf {
    program: PathBuf,
}

impl Readelf {
    /// Uses `readelf` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("readelf"),
        }
    }
}

impl Default for Readelf {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteLister for Readelf {
    fn name(&self) -> &str {
        "readelf"
    }

    fn list_notes(&self, path: &Path) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("-n")
            .arg(path)
            .output()
            .with_context(|| format!("failed to run {}", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} -n exited with {}: {}", self.program.display(), output.status, stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Lines of a note listing that mention a page size.
pub fn page_size_lines(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter(|line| {
            let lower = line.to_ascii_lowercase();
            lower.contains("max-page-size")
                || lower.contains("page size")
                || line.contains("16384")
                || line.contains("4096")
        })
        .map(|line| line.trim().to_string())
        .collect()
}

/// Result of consulting the lister for one file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CrossCheck {
    /// The lister ran; `lines` are the page-size related lines it printed.
    Listed {
        /// Matching lines, trimmed.
        lines: Vec<String>,
    },
    /// The lister could not be run.
    Unavailable {
        /// Why.
        reason: String,
    },
}

/// Runs `lister` on `path` and extracts the page-size lines.
pub fn cross_check(lister: &dyn NoteLister, path: &Path) -> CrossCheck {
    match lister.list_notes(path) {
        Ok(listing) => CrossCheck::Listed {
            lines: page_size_lines(&listing),
        },
        Err(e) => CrossCheck::Unavailable {
            reason: format!("{}: {e:#}", lister.name()),
        },
    }
}
