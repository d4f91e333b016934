//! Note section discovery and note record parsing.
//!
//! A note blob is a sequence of records, each a 12-byte header (`namesz`,
//! `descsz`, `type`) followed by the name and the descriptor, both padded to
//! a 4-byte boundary. Parsing is zero-copy: [`NoteRecord`] borrows from the
//! input.
//!
//! Malformed or truncated trailing data ends iteration rather than producing
//! an error, matching how tools such as `readelf` treat partial note tables.

use alloc::vec::Vec;
use core::iter::FusedIterator;

use crate::ElfError;
use crate::header::{ByteOrder, ElfIdentity, TableGeometry, TableRecords};
use crate::property::PropertyIter;
use crate::segment::{PT_NOTE, ProgramHeaderIter};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Section type for note sections.
pub const SHT_NOTE: u32 = 7;

/// `NT_GNU_ABI_TAG`: ABI tag note.
pub const NT_GNU_ABI_TAG: u32 = 1;

/// `NT_GNU_BUILD_ID`: unique build ID.
pub const NT_GNU_BUILD_ID: u32 = 3;

/// `NT_GNU_PROPERTY_TYPE_0`: program property note.
pub const NT_GNU_PROPERTY_TYPE_0: u32 = 5;

/// Size of the fixed note header (`namesz`, `descsz`, `type`).
const NOTE_HEADER_SIZE: usize = 12;

/// Rounds `n` up to the next multiple of 4.
pub(crate) fn align4(n: usize) -> Option<usize> {
    Some(n.checked_add(3)? & !3)
}

// ---------------------------------------------------------------------------
// Section headers
// ---------------------------------------------------------------------------

/// The section header fields needed to locate note payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    /// Section type (`SHT_*`).
    pub sh_type: u32,
    /// File offset of the section contents.
    pub offset: u64,
    /// Size of the section contents in bytes.
    pub size: u64,
}

impl SectionHeader {
    fn decode(record: &[u8], identity: ElfIdentity) -> Option<Self> {
        let sh = &identity.layout().section_header;
        let order = identity.byte_order;
        Some(Self {
            sh_type: u32::try_from(sh.sh_type.read(record, order)?).ok()?,
            offset: sh.sh_offset.read(record, order)?,
            size: sh.sh_size.read(record, order)?,
        })
    }
}

/// Iterator over every entry of the section header table.
#[derive(Debug, Clone)]
pub struct SectionHeaderIter<'a> {
    records: TableRecords<'a>,
    identity: ElfIdentity,
}

impl<'a> SectionHeaderIter<'a> {
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
        let record_size = identity.layout().section_header.record_size;
        Ok(Self {
            records: geometry.records(data, record_size)?,
            identity,
        })
    }
}

impl Iterator for SectionHeaderIter<'_> {
    type Item = Result<SectionHeader, ElfError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(SectionHeader::decode(record, self.identity).ok_or(ElfError::TruncatedFile))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

// ---------------------------------------------------------------------------
// Note regions
// ---------------------------------------------------------------------------

/// Where a note blob was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteOrigin {
    /// An `SHT_NOTE` section.
    Section,
    /// A `PT_NOTE` segment.
    Segment,
}

/// A byte range of the file holding a note blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteRegion {
    /// File offset of the blob.
    pub offset: u64,
    /// Size of the blob in bytes.
    pub size: u64,
    /// Table the region was found through.
    pub origin: NoteOrigin,
}

impl NoteRegion {
    /// Returns the blob bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::TruncatedFile`] if the region extends past `data`.
    pub fn bytes<'a>(&self, data: &'a [u8]) -> Result<&'a [u8], ElfError> {
        let start = usize::try_from(self.offset).map_err(|_| ElfError::TruncatedFile)?;
        let len = usize::try_from(self.size).map_err(|_| ElfError::TruncatedFile)?;
        let end = start.checked_add(len).ok_or(ElfError::TruncatedFile)?;
        data.get(start..end).ok_or(ElfError::TruncatedFile)
    }
}

/// Returns every `SHT_NOTE` section in section-table order.
///
/// # Errors
///
/// Returns [`ElfError::TruncatedFile`] if the section header table extends
/// past `data`.
pub fn note_sections(
    data: &[u8],
    identity: ElfIdentity,
    geometry: TableGeometry,
) -> Result<Vec<NoteRegion>, ElfError> {
    let mut regions = Vec::new();
    for sh in SectionHeaderIter::new(data, identity, geometry)? {
        let sh = sh?;
        if sh.sh_type == SHT_NOTE {
            regions.push(NoteRegion {
                offset: sh.offset,
                size: sh.size,
                origin: NoteOrigin::Section,
            });
        }
    }
    Ok(regions)
}

/// Returns every `PT_NOTE` segment in program-table order.
///
/// # Errors
///
/// Returns [`ElfError::TruncatedFile`] if the program header table extends
/// past `data`.
pub fn note_segments(
    data: &[u8],
    identity: ElfIdentity,
    geometry: TableGeometry,
) -> Result<Vec<NoteRegion>, ElfError> {
    let mut regions = Vec::new();
    for ph in ProgramHeaderIter::new(data, identity, geometry)? {
        let ph = ph?;
        if ph.p_type == PT_NOTE {
            regions.push(NoteRegion {
                offset: ph.offset,
                size: ph.filesz,
                origin: NoteOrigin::Segment,
            });
        }
    }
    Ok(regions)
}

// ---------------------------------------------------------------------------
// NoteRecord / NoteIter
// ---------------------------------------------------------------------------

/// A single note record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteRecord<'a> {
    /// Owner name with trailing NUL bytes removed.
    pub name: &'a [u8],
    /// Descriptor bytes, without padding.
    pub desc: &'a [u8],
    /// Note type; its meaning depends on `name`.
    pub n_type: u32,
}

impl<'a> NoteRecord<'a> {
    /// Returns the owner name as a string, if it is valid UTF-8.
    #[must_use]
    pub fn owner(&self) -> Option<&'a str> {
        core::str::from_utf8(self.name).ok()
    }

    /// Returns `true` if this is a GNU program property note: type
    /// `NT_GNU_PROPERTY_TYPE_0` with an owner name containing `GNU`.
    #[must_use]
    pub fn is_gnu_property(&self) -> bool {
        self.n_type == NT_GNU_PROPERTY_TYPE_0 && self.name.windows(3).any(|w| w == b"GNU")
    }

    /// Iterates over the property records of a GNU property note.
    ///
    /// Yields nothing for any other note.
    #[must_use]
    pub fn properties(&self, byte_order: ByteOrder) -> PropertyIter<'a> {
        let desc = if self.is_gnu_property() { self.desc } else { &[] };
        PropertyIter::new(desc, byte_order)
    }
}

/// Iterator over the note records in a note blob.
#[derive(Debug, Clone)]
pub struct NoteIter<'a> {
    data: &'a [u8],
    byte_order: ByteOrder,
}

impl<'a> NoteIter<'a> {
    /// Creates an iterator over the notes in `data`.
    #[must_use]
    pub fn new(data: &'a [u8], byte_order: ByteOrder) -> Self {
        Self { data, byte_order }
    }

    fn parse_next(&self) -> Option<(NoteRecord<'a>, &'a [u8])> {
        let data = self.data;
        if data.len() < NOTE_HEADER_SIZE {
            return None;
        }
        let namesz = usize::try_from(self.byte_order.read_u32(data, 0)?).ok()?;
        let descsz = usize::try_from(self.byte_order.read_u32(data, 4)?).ok()?;
        let n_type = self.byte_order.read_u32(data, 8)?;

        let name_end = NOTE_HEADER_SIZE.checked_add(namesz)?;
        let name = data.get(NOTE_HEADER_SIZE..name_end)?;

        let desc_start = NOTE_HEADER_SIZE.checked_add(align4(namesz)?)?;
        let desc_end = desc_start.checked_add(descsz)?;
        let desc = data.get(desc_start..desc_end)?;

        // Padding after the last descriptor may be missing.
        let next = desc_start.checked_add(align4(descsz)?)?;
        let rest = data.get(next..).unwrap_or(&[]);

        Some((
            NoteRecord {
                name: strip_nul(name),
                desc,
                n_type,
            },
            rest,
        ))
    }
}

impl<'a> Iterator for NoteIter<'a> {
    type Item = NoteRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.parse_next() {
            Some((note, rest)) => {
                self.data = rest;
                Some(note)
            }
            None => {
                self.data = &[];
                None
            }
        }
    }
}

impl FusedIterator for NoteIter<'_> {}

/// Strips trailing NUL bytes.
fn strip_nul(name: &[u8]) -> &[u8] {
    let end = name.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &name[..end]
}

/// Decodes every note in every region, in region order.
///
/// # Errors
///
/// Returns [`ElfError::TruncatedFile`] if a region lies past the end of `data`.
pub fn read_notes<'a>(
    data: &'a [u8],
    byte_order: ByteOrder,
    regions: &[NoteRegion],
) -> Result<Vec<NoteRecord<'a>>, ElfError> {
    let mut notes = Vec::new();
    for region in regions {
        notes.extend(NoteIter::new(region.bytes(data)?, byte_order));
    }
    Ok(notes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
