//! Program header (segment) table decoding.

use alloc::vec::Vec;

use crate::ElfError;
use crate::header::{ElfIdentity, TableGeometry, TableRecords};

// ---------------------------------------------------------------------------
// Segment type constants
// ---------------------------------------------------------------------------

/// Loadable segment.
pub const PT_LOAD: u32 = 1;

/// Dynamic linking information.
pub const PT_DYNAMIC: u32 = 2;

/// Auxiliary information (notes).
pub const PT_NOTE: u32 = 4;

bitflags::bitflags! {
    /// Segment permission flags (`p_flags`).
    ///
    /// Unknown bits (OS- or processor-specific) are retained.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SegmentFlags: u32 {
        /// Execute.
        const X = 1 << 0;
        /// Write.
        const W = 1 << 1;
        /// Read.
        const R = 1 << 2;
    }
}

impl core::fmt::Display for SegmentFlags {
    /// Formats as `readelf`-style `RWE` columns.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let col = |flag, c| if self.contains(flag) { c } else { ' ' };
        write!(f, "{}{}{}", col(Self::R, 'R'), col(Self::W, 'W'), col(Self::X, 'E'))
    }
}

// ---------------------------------------------------------------------------
// ProgramHeader
// ---------------------------------------------------------------------------

/// A decoded program header entry of any type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    /// Segment type (`PT_*`).
    pub p_type: u32,
    /// Permission flags.
    pub flags: SegmentFlags,
    /// File offset of the segment contents.
    pub offset: u64,
    /// Virtual address of the first byte.
    pub vaddr: u64,
    /// Size of the segment in the file.
    pub filesz: u64,
    /// Size of the segment in memory.
    pub memsz: u64,
    /// Required alignment of `offset` and `vaddr`.
    pub align: u64,
}

impl ProgramHeader {
    /// Decodes one record using the width-specific field order.
    fn decode(record: &[u8], identity: ElfIdentity) -> Option<Self> {
        let ph = &identity.layout().program_header;
        let order = identity.byte_order;
        let flags = u32::try_from(ph.p_flags.read(record, order)?).ok()?;
        Some(Self {
            p_type: u32::try_from(ph.p_type.read(record, order)?).ok()?,
            flags: SegmentFlags::from_bits_retain(flags),
            offset: ph.p_offset.read(record, order)?,
            vaddr: ph.p_vaddr.read(record, order)?,
            filesz: ph.p_filesz.read(record, order)?,
            memsz: ph.p_memsz.read(record, order)?,
            align: ph.p_align.read(record, order)?,
        })
    }

    /// Returns `true` for `PT_LOAD` entries.
    #[must_use]
    pub fn is_load(&self) -> bool {
        self.p_type == PT_LOAD
    }
}

/// Iterator over every entry of the program header table.
#[derive(Debug, Clone)]
pub struct ProgramHeaderIter<'a> {
    records: TableRecords<'a>,
    identity: ElfIdentity,
}

impl<'a> ProgramHeaderIter<'a> {
    /// Bounds-checks the table and creates an iterator over its entries.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::TruncatedFile`] if the table extends past `data`.
    pub fn new(
        data: &'a [u8],
        identity: ElfIdentity,
        geometry: TableGeometry,
    ) -> Result<Self, ElfError> {
        let record_size = identity.layout().program_header.record_size;
        Ok(Self {
            records: geometry.records(data, record_size)?,
            identity,
        })
    }
}

impl Iterator for ProgramHeaderIter<'_> {
    type Item = Result<ProgramHeader, ElfError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(ProgramHeader::decode(record, self.identity).ok_or(ElfError::TruncatedFile))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

// ---------------------------------------------------------------------------
// LoadSegment
// ---------------------------------------------------------------------------

/// A `PT_LOAD` segment: a region mapped into memory at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSegment {
    /// File offset of the segment contents.
    pub offset: u64,
    /// Virtual address of the first byte.
    pub vaddr: u64,
    /// Size of the segment in the file.
    pub filesz: u64,
    /// Size of the segment in memory.
    pub memsz: u64,
    /// Required alignment; the page size the segment was linked for.
    pub align: u64,
    /// Permission flags.
    pub flags: SegmentFlags,
}

impl From<ProgramHeader> for LoadSegment {
    fn from(ph: ProgramHeader) -> Self {
        Self {
            offset: ph.offset,
            vaddr: ph.vaddr,
            filesz: ph.filesz,
            memsz: ph.memsz,
            align: ph.align,
            flags: ph.flags,
        }
    }
}

/// Decodes the program header table and returns its `PT_LOAD` entries in
/// on-disk order.
///
/// # Errors
///
/// Returns [`ElfError::TruncatedFile`] if any entry lies past the end of
/// `data`; no partial list is returned.
pub fn read_load_segments(
    data: &[u8],
    identity: ElfIdentity,
    geometry: TableGeometry,
) -> Result<Vec<LoadSegment>, ElfError> {
    let mut segments = Vec::new();
    for ph in ProgramHeaderIter::new(data, identity, geometry)? {
        let ph = ph?;
        if ph.is_load() {
            segments.push(LoadSegment::from(ph));
        }
    }
    Ok(segments)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
