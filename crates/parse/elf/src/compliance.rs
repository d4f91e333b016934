//! Page-size compliance of `PT_LOAD` segment alignment.
//!
//! A shared object runs on a kernel with page size `P` only if every loadable
//! segment is aligned to at least `P`. The largest `p_align` across the LOAD
//! segments is therefore the largest page size the object supports.

use alloc::vec::Vec;

use crate::ElfError;
use crate::segment::LoadSegment;

/// 16 KiB: the minimum alignment required for large-page devices.
pub const PAGE_SIZE_16K: u64 = 16 * 1024;

/// Outcome of evaluating a file's LOAD segments against an alignment threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceResult {
    /// Largest `p_align` across all LOAD segments.
    pub max_align: u64,
    /// Threshold `max_align` was compared against.
    pub threshold: u64,
    /// `max_align >= threshold`.
    pub is_compliant: bool,
    /// Number of LOAD segments.
    pub segment_count: usize,
    /// The LOAD segments, in on-disk order.
    pub segments: Vec<LoadSegment>,
}

impl ComplianceResult {
    /// LOAD segments whose alignment is zero or not a power of two.
    ///
    /// These take part in `max_align` unchanged; this only lets callers flag
    /// them.
    pub fn irregular_segments(&self) -> impl Iterator<Item = &LoadSegment> {
        self.segments.iter().filter(|s| !s.align.is_power_of_two())
    }
}

/// Evaluates `segments` against [`PAGE_SIZE_16K`].
///
/// # Errors
///
/// Returns [`ElfError::NoLoadSegments`] if `segments` is empty.
pub fn evaluate(segments: Vec<LoadSegment>) -> Result<ComplianceResult, ElfError> {
    evaluate_with_threshold(segments, PAGE_SIZE_16K)
}

/// Evaluates `segments` against an arbitrary alignment `threshold`.
///
/// # Errors
///
/// Returns [`ElfError::NoLoadSegments`] if `segments` is empty.
pub fn evaluate_with_threshold(
    segments: Vec<LoadSegment>,
    threshold: u64,
) -> Result<ComplianceResult, ElfError> {
    let max_align = segments
        .iter()
        .map(|s| s.align)
        .max()
        .ok_or(ElfError::NoLoadSegments)?;

    Ok(ComplianceResult {
        max_align,
        threshold,
        is_compliant: max_align >= threshold,
        segment_count: segments.len(),
        segments,
    })
}
