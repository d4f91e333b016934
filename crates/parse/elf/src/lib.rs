//! `pagecheck-elf` --- a standalone, `no_std` ELF segment and note parser.
//!
//! Decodes just enough of an ELF32 or ELF64 object, in either byte order, to
//! answer two questions about a shared library:
//!
//! - **Segment alignment**: is every `PT_LOAD` segment aligned for 16 KiB
//!   pages? See [`compliance`].
//! - **Note metadata**: which notes and GNU program properties does the
//!   toolchain embed? See [`note`] and [`property`].
//!
//! All parsing is zero-copy over a `&[u8]` holding the whole file. Malformed
//! input produces an [`ElfError`], never a panic.
//!
//! # Usage
//!
//! ```ignore
//! let elf = ElfFile::parse(&bytes)?;
//! let result = elf.compliance()?;
//! if !result.is_compliant {
//!     // max_align < 16 KiB
//! }
//! for finding in elf.properties()? {
//!     let value = PropertyInterpreter::with_gnu_defaults().interpret(&finding, elf.identity());
//! }
//! ```

#![no_std]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

pub mod compliance;
pub mod header;
pub mod layout;
pub mod note;
pub mod property;
pub mod segment;

#[cfg(test)]
mod fixture;

pub use compliance::{ComplianceResult, PAGE_SIZE_16K, evaluate, evaluate_with_threshold};
pub use header::{AddressWidth, ByteOrder, ElfHeader, ElfIdentity, TableGeometry};
pub use note::{NoteIter, NoteOrigin, NoteRecord, NoteRegion, SectionHeader};
pub use property::{
    PropertyFinding, PropertyInterpreter, PropertyIter, PropertyRecord, PropertyValue,
};
pub use segment::{LoadSegment, ProgramHeader, ProgramHeaderIter, SegmentFlags};

use alloc::vec::Vec;
use core::fmt;

/// Errors that can occur while decoding an ELF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfError {
    /// The magic signature is absent or the input is shorter than the
    /// identification region.
    NotElf,
    /// A header field, table or note region lies past the end of the input.
    TruncatedFile,
    /// The program header table contains no `PT_LOAD` entries.
    NoLoadSegments,
    /// The class or data-encoding byte has an unknown value.
    UnsupportedEncoding,
}

impl fmt::Display for ElfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotElf => write!(f, "not a valid ELF file"),
            Self::TruncatedFile => write!(f, "ELF file is truncated"),
            Self::NoLoadSegments => write!(f, "no LOAD segments found"),
            Self::UnsupportedEncoding => write!(f, "unsupported ELF class or data encoding"),
        }
    }
}

impl core::error::Error for ElfError {}

// ---------------------------------------------------------------------------
// ElfFile
// ---------------------------------------------------------------------------

/// A parsed ELF file.
///
/// Borrows the raw file bytes. Only the header is decoded up front; each
/// accessor decodes its own facet on demand, so a damaged section table does
/// not prevent the segment check and vice versa.
#[derive(Debug, Clone, Copy)]
pub struct ElfFile<'a> {
    data: &'a [u8],
    header: ElfHeader,
}

impl<'a> ElfFile<'a> {
    /// Decodes the ELF header of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::NotElf`], [`ElfError::UnsupportedEncoding`] or
    /// [`ElfError::TruncatedFile`] if the header cannot be decoded.
    pub fn parse(data: &'a [u8]) -> Result<Self, ElfError> {
        Ok(Self {
            data,
            header: ElfHeader::parse(data)?,
        })
    }

    /// Returns the address width and byte order.
    #[must_use]
    pub fn identity(&self) -> ElfIdentity {
        self.header.identity
    }

    /// Returns the program header table geometry.
    #[must_use]
    pub fn program_header_table(&self) -> TableGeometry {
        self.header.program_headers
    }

    /// Returns the section header table geometry.
    #[must_use]
    pub fn section_header_table(&self) -> TableGeometry {
        self.header.section_headers
    }

    /// Returns an iterator over all program headers.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::TruncatedFile`] if the table extends past the file.
    pub fn program_headers(&self) -> Result<ProgramHeaderIter<'a>, ElfError> {
        ProgramHeaderIter::new(self.data, self.identity(), self.program_header_table())
    }

    /// Returns the `PT_LOAD` segments in on-disk order.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::TruncatedFile`] if the table extends past the file.
    pub fn load_segments(&self) -> Result<Vec<LoadSegment>, ElfError> {
        segment::read_load_segments(self.data, self.identity(), self.program_header_table())
    }

    /// Evaluates the LOAD segments against [`PAGE_SIZE_16K`].
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::TruncatedFile`] or [`ElfError::NoLoadSegments`].
    pub fn compliance(&self) -> Result<ComplianceResult, ElfError> {
        self.compliance_with_threshold(PAGE_SIZE_16K)
    }

    /// Evaluates the LOAD segments against `threshold`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::TruncatedFile`] or [`ElfError::NoLoadSegments`].
    pub fn compliance_with_threshold(&self, threshold: u64) -> Result<ComplianceResult, ElfError> {
        evaluate_with_threshold(self.load_segments()?, threshold)
    }

    /// Returns the `SHT_NOTE` sections.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::TruncatedFile`] if the section table extends past
    /// the file.
    pub fn note_sections(&self) -> Result<Vec<NoteRegion>, ElfError> {
        note::note_sections(self.data, self.identity(), self.section_header_table())
    }

    /// Returns the `PT_NOTE` segments.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::TruncatedFile`] if the program header table
    /// extends past the file.
    pub fn note_segments(&self) -> Result<Vec<NoteRegion>, ElfError> {
        note::note_segments(self.data, self.identity(), self.program_header_table())
    }

    /// Returns the regions holding notes: the `SHT_NOTE` sections, or the
    /// `PT_NOTE` segments when the file has no note sections (for example
    /// after `strip --strip-section-headers`).
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::TruncatedFile`] if a header table extends past the
    /// file.
    pub fn note_regions(&self) -> Result<Vec<NoteRegion>, ElfError> {
        let sections = self.note_sections()?;
        if sections.is_empty() {
            self.note_segments()
        } else {
            Ok(sections)
        }
    }

    /// Decodes every note record.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::TruncatedFile`] if a header table or note region
    /// extends past the file.
    pub fn notes(&self) -> Result<Vec<NoteRecord<'a>>, ElfError> {
        note::read_notes(self.data, self.identity().byte_order, &self.note_regions()?)
    }

    /// Decodes the properties of every GNU property note.
    ///
    /// # Errors
    ///
    /// Same as [`ElfFile::notes`].
    pub fn properties(&self) -> Result<Vec<PropertyFinding<'a>>, ElfError> {
        let notes = self.notes()?;
        Ok(property::collect_properties(&notes, self.identity().byte_order))
    }
}

// ---------------------------------------------------------------------------
// Full analysis
// ---------------------------------------------------------------------------

/// Result of running both the segment and the note analysis on one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis<'a> {
    /// Address width and byte order.
    pub identity: ElfIdentity,
    /// Segment alignment verdict.
    pub compliance: ComplianceResult,
    /// Every note record.
    pub notes: Vec<NoteRecord<'a>>,
    /// Every GNU property, annotated with its note.
    pub properties: Vec<PropertyFinding<'a>>,
}

/// Runs the full analysis of `data`.
///
/// # Errors
///
/// Returns the first [`ElfError`] from either branch; no partial result is
/// produced.
pub fn analyze(data: &[u8]) -> Result<Analysis<'_>, ElfError> {
    let elf = ElfFile::parse(data)?;
    let compliance = elf.compliance()?;
    let notes = elf.notes()?;
    let properties = property::collect_properties(&notes, elf.identity().byte_order);
    Ok(Analysis {
        identity: elf.identity(),
        compliance,
        notes,
        properties,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
