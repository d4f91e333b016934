//! ELF identification, file header and table geometry.
//!
//! The identification bytes decide the address width and byte order for the
//! rest of the file; [`ElfHeader::parse`] resolves both and then reads the
//! program-header and section-header table geometries through the matching
//! [`Layout`].

use crate::ElfError;
use crate::layout::{Field, LAYOUT_32, LAYOUT_64, Layout};

// ---------------------------------------------------------------------------
// Identification constants
// ---------------------------------------------------------------------------

/// ELF magic bytes: `\x7fELF`.
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// Size of the `e_ident` identification region.
pub const EI_NIDENT: usize = 16;

/// Offset of the class byte within `e_ident`.
pub const EI_CLASS: usize = 4;

/// Offset of the data-encoding byte within `e_ident`.
pub const EI_DATA: usize = 5;

/// 32-bit objects.
pub const ELFCLASS32: u8 = 1;

/// 64-bit objects.
pub const ELFCLASS64: u8 = 2;

/// Two's complement, little-endian.
pub const ELFDATA2LSB: u8 = 1;

/// Two's complement, big-endian.
pub const ELFDATA2MSB: u8 = 2;

// ---------------------------------------------------------------------------
// ByteOrder
// ---------------------------------------------------------------------------

/// Byte order of every multi-byte integer in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// `ELFDATA2LSB`
    Little,
    /// `ELFDATA2MSB`
    Big,
}

impl ByteOrder {
    /// Reads a `u16` at `offset`, or `None` if it would run past `data`.
    #[must_use]
    pub fn read_u16(self, data: &[u8], offset: usize) -> Option<u16> {
        let bytes: [u8; 2] = data.get(offset..offset.checked_add(2)?)?.try_into().ok()?;
        Some(match self {
            Self::Little => u16::from_le_bytes(bytes),
            Self::Big => u16::from_be_bytes(bytes),
        })
    }

    /// Reads a `u32` at `offset`, or `None` if it would run past `data`.
    #[must_use]
    pub fn read_u32(self, data: &[u8], offset: usize) -> Option<u32> {
        let bytes: [u8; 4] = data.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
        Some(match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        })
    }

    /// Reads a `u64` at `offset`, or `None` if it would run past `data`.
    #[must_use]
    pub fn read_u64(self, data: &[u8], offset: usize) -> Option<u64> {
        let bytes: [u8; 8] = data.get(offset..offset.checked_add(8)?)?.try_into().ok()?;
        Some(match self {
            Self::Little => u64::from_le_bytes(bytes),
            Self::Big => u64::from_be_bytes(bytes),
        })
    }
}

// ---------------------------------------------------------------------------
// AddressWidth / ElfIdentity
// ---------------------------------------------------------------------------

/// Address width of the object (`EI_CLASS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// `ELFCLASS32`
    ThirtyTwoBit,
    /// `ELFCLASS64`
    SixtyFourBit,
}

impl AddressWidth {
    /// Returns the field layout for this width.
    #[must_use]
    pub fn layout(self) -> &'static Layout {
        match self {
            Self::ThirtyTwoBit => &LAYOUT_32,
            Self::SixtyFourBit => &LAYOUT_64,
        }
    }

    /// Returns the width in bits (32 or 64).
    #[must_use]
    pub fn bits(self) -> u32 {
        match self {
            Self::ThirtyTwoBit => 32,
            Self::SixtyFourBit => 64,
        }
    }
}

/// Address width and byte order, fixed for the whole file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElfIdentity {
    /// 32- or 64-bit field widths.
    pub width: AddressWidth,
    /// Little- or big-endian integers.
    pub byte_order: ByteOrder,
}

impl ElfIdentity {
    /// Decodes the identification region at the start of `data`.
    ///
    /// # Errors
    ///
    /// - [`ElfError::NotElf`] if the magic is missing or `data` is shorter than
    ///   [`EI_NIDENT`].
    /// - [`ElfError::UnsupportedEncoding`] for an unknown class or data byte.
    pub fn parse(data: &[u8]) -> Result<Self, ElfError> {
        if !data.starts_with(&ELF_MAGIC) || data.len() < EI_NIDENT {
            return Err(ElfError::NotElf);
        }

        let width = match data[EI_CLASS] {
            ELFCLASS32 => AddressWidth::ThirtyTwoBit,
            ELFCLASS64 => AddressWidth::SixtyFourBit,
            _ => return Err(ElfError::UnsupportedEncoding),
        };
        let byte_order = match data[EI_DATA] {
            ELFDATA2LSB => ByteOrder::Little,
            ELFDATA2MSB => ByteOrder::Big,
            _ => return Err(ElfError::UnsupportedEncoding),
        };

        Ok(Self { width, byte_order })
    }

    /// Returns the field layout for this identity's width.
    #[must_use]
    pub fn layout(&self) -> &'static Layout {
        self.width.layout()
    }
}

// ---------------------------------------------------------------------------
// TableGeometry
// ---------------------------------------------------------------------------

/// Location and shape of a header table (program or section headers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableGeometry {
    /// File offset of the first entry.
    pub offset: u64,
    /// Declared size of one entry (`e_phentsize` / `e_shentsize`).
    pub entry_size: u16,
    /// Number of entries (`e_phnum` / `e_shnum`).
    pub entry_count: u16,
}

impl TableGeometry {
    /// Distance between consecutive entries.
    ///
    /// Never smaller than `record_size`, so a zero or undersized declared
    /// entry size still steps over whole records.
    #[must_use]
    pub fn stride(&self, record_size: usize) -> usize {
        usize::from(self.entry_size).max(record_size)
    }

    /// Returns an iterator over the raw records of this table.
    ///
    /// The whole table is bounds-checked up front, so the iterator never
    /// yields a partial table.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::TruncatedFile`] if `entry_count` records starting at
    /// `offset` do not fit inside `data`.
    pub fn records<'a>(
        &self,
        data: &'a [u8],
        record_size: usize,
    ) -> Result<TableRecords<'a>, ElfError> {
        let stride = self.stride(record_size);
        let count = usize::from(self.entry_count);
        if count == 0 {
            return Ok(TableRecords {
                table: &[],
                stride,
                record_size,
            });
        }

        let start = usize::try_from(self.offset).map_err(|_| ElfError::TruncatedFile)?;
        let len = stride.checked_mul(count).ok_or(ElfError::TruncatedFile)?;
        let end = start.checked_add(len).ok_or(ElfError::TruncatedFile)?;
        let table = data.get(start..end).ok_or(ElfError::TruncatedFile)?;

        Ok(TableRecords {
            table,
            stride,
            record_size,
        })
    }
}

/// Iterator over the fixed-size records of a header table.
///
/// Each item is exactly `record_size` bytes; any bytes between records
/// (when `entry_size` is larger than the record) are skipped.
#[derive(Debug, Clone)]
pub struct TableRecords<'a> {
    table: &'a [u8],
    stride: usize,
    record_size: usize,
}

impl<'a> Iterator for TableRecords<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.table.is_empty() {
            return None;
        }
        let record = self.table.get(..self.record_size)?;
        self.table = self.table.get(self.stride..).unwrap_or(&[]);
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.len() / self.stride;
        (remaining, Some(remaining))
    }
}

// ---------------------------------------------------------------------------
// ElfHeader
// ---------------------------------------------------------------------------

/// The parts of the ELF file header this crate needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeader {
    /// Address width and byte order.
    pub identity: ElfIdentity,
    /// Program header table (`e_phoff`, `e_phentsize`, `e_phnum`).
    pub program_headers: TableGeometry,
    /// Section header table (`e_shoff`, `e_shentsize`, `e_shnum`).
    pub section_headers: TableGeometry,
}

impl ElfHeader {
    /// Decodes the identification region and the table geometries.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::NotElf`] or [`ElfError::UnsupportedEncoding`] from
    /// [`ElfIdentity::parse`], and [`ElfError::TruncatedFile`] if `data` is
    /// shorter than the file header of its class.
    pub fn parse(data: &[u8]) -> Result<Self, ElfError> {
        let identity = ElfIdentity::parse(data)?;
        let order = identity.byte_order;
        let hdr = &identity.layout().header;
        let header = data.get(..hdr.size).ok_or(ElfError::TruncatedFile)?;

        let read = |field: Field| field.read(header, order).ok_or(ElfError::TruncatedFile);
        // The 16-bit fields cannot exceed u16::MAX.
        let read_u16 = |field| read(field).map(|v| u16::try_from(v).unwrap_or(u16::MAX));

        let program_headers = TableGeometry {
            offset: read(hdr.phoff)?,
            entry_size: read_u16(hdr.phentsize)?,
            entry_count: read_u16(hdr.phnum)?,
        };
        let section_headers = TableGeometry {
            offset: read(hdr.shoff)?,
            entry_size: read_u16(hdr.shentsize)?,
            entry_count: read_u16(hdr.shnum)?,
        };

        Ok(Self {
            identity,
            program_headers,
            section_headers,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::ElfImage;
    use alloc::vec;

    #[test]
    fn byte_order_reads() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(ByteOrder::Little.read_u16(&data, 0), Some(0x0201));
        assert_eq!(ByteOrder::Big.read_u16(&data, 0), Some(0x0102));
        assert_eq!(ByteOrder::Little.read_u32(&data, 4), Some(0x0807_0605));
        assert_eq!(ByteOrder::Big.read_u32(&data, 4), Some(0x0506_0708));
        assert_eq!(ByteOrder::Big.read_u64(&data, 0), Some(0x0102_0304_0506_0708));
        assert_eq!(ByteOrder::Little.read_u32(&data, 6), None);
        assert_eq!(ByteOrder::Little.read_u16(&data, usize::MAX), None);
    }

    #[test]
    fn four_byte_non_elf_is_not_elf() {
        assert_eq!(ElfIdentity::parse(b"MZ\x90\x00"), Err(ElfError::NotElf));
        assert_eq!(ElfIdentity::parse(&[0u8; 4]), Err(ElfError::NotElf));
    }

    #[test]
    fn magic_only_is_not_elf() {
        assert_eq!(ElfIdentity::parse(&ELF_MAGIC), Err(ElfError::NotElf));
        assert_eq!(ElfIdentity::parse(&[]), Err(ElfError::NotElf));
    }

    #[test]
    fn unknown_class_or_data_is_unsupported() {
        let mut ident = vec![0u8; EI_NIDENT];
        ident[..4].copy_from_slice(&ELF_MAGIC);
        ident[EI_CLASS] = 3;
        ident[EI_DATA] = ELFDATA2LSB;
        assert_eq!(ElfIdentity::parse(&ident), Err(ElfError::UnsupportedEncoding));

        ident[EI_CLASS] = ELFCLASS64;
        ident[EI_DATA] = 0;
        assert_eq!(ElfIdentity::parse(&ident), Err(ElfError::UnsupportedEncoding));
    }

    #[test]
    fn identity_selects_width_and_order() {
        for (class, data, width, order) in [
            (ELFCLASS32, ELFDATA2LSB, AddressWidth::ThirtyTwoBit, ByteOrder::Little),
            (ELFCLASS32, ELFDATA2MSB, AddressWidth::ThirtyTwoBit, ByteOrder::Big),
            (ELFCLASS64, ELFDATA2LSB, AddressWidth::SixtyFourBit, ByteOrder::Little),
            (ELFCLASS64, ELFDATA2MSB, AddressWidth::SixtyFourBit, ByteOrder::Big),
        ] {
            let mut ident = vec![0u8; EI_NIDENT];
            ident[..4].copy_from_slice(&ELF_MAGIC);
            ident[EI_CLASS] = class;
            ident[EI_DATA] = data;
            let id = ElfIdentity::parse(&ident).unwrap();
            assert_eq!(id.width, width);
            assert_eq!(id.byte_order, order);
        }
    }

    #[test]
    fn ident_only_header_is_truncated() {
        let image = ElfImage::new(AddressWidth::SixtyFourBit, ByteOrder::Little).build();
        assert_eq!(ElfHeader::parse(&image[..EI_NIDENT]), Err(ElfError::TruncatedFile));
    }

    #[test]
    fn header_shorter_than_its_class_is_truncated() {
        let image = ElfImage::new(AddressWidth::SixtyFourBit, ByteOrder::Little).build();
        // Past every geometry field (e_shnum ends at 62) but short of e_ehsize.
        assert_eq!(ElfHeader::parse(&image[..63]), Err(ElfError::TruncatedFile));
        assert!(ElfHeader::parse(&image[..64]).is_ok());

        let image = ElfImage::new(AddressWidth::ThirtyTwoBit, ByteOrder::Big).build();
        assert_eq!(ElfHeader::parse(&image[..51]), Err(ElfError::TruncatedFile));
        assert!(ElfHeader::parse(&image[..52]).is_ok());
    }

    #[test]
    fn header_geometry_64_le() {
        let image = ElfImage::new(AddressWidth::SixtyFourBit, ByteOrder::Little)
            .load(0x1000)
            .load(0x4000)
            .build();
        let hdr = ElfHeader::parse(&image).unwrap();
        assert_eq!(hdr.program_headers.offset, 64);
        assert_eq!(hdr.program_headers.entry_size, 56);
        assert_eq!(hdr.program_headers.entry_count, 2);
        assert_eq!(hdr.section_headers.entry_size, 64);
    }

    #[test]
    fn header_geometry_32_be() {
        let image = ElfImage::new(AddressWidth::ThirtyTwoBit, ByteOrder::Big)
            .load(0x1000)
            .note_section(vec![])
            .build();
        let hdr = ElfHeader::parse(&image).unwrap();
        assert_eq!(hdr.identity.byte_order, ByteOrder::Big);
        assert_eq!(hdr.program_headers.offset, 52);
        assert_eq!(hdr.program_headers.entry_size, 32);
        assert_eq!(hdr.program_headers.entry_count, 1);
        assert_eq!(hdr.section_headers.entry_size, 40);
        // Null section + one note section.
        assert_eq!(hdr.section_headers.entry_count, 2);
    }

    #[test]
    fn table_records_checks_whole_table() {
        let geometry = TableGeometry {
            offset: 4,
            entry_size: 8,
            entry_count: 3,
        };
        assert!(geometry.records(&[0u8; 28], 8).is_ok());
        assert_eq!(geometry.records(&[0u8; 27], 8).unwrap_err(), ElfError::TruncatedFile);
    }

    #[test]
    fn table_records_overflowing_offset() {
        let geometry = TableGeometry {
            offset: u64::MAX,
            entry_size: 8,
            entry_count: 1,
        };
        assert_eq!(geometry.records(&[0u8; 64], 8).unwrap_err(), ElfError::TruncatedFile);
    }

    #[test]
    fn table_records_empty_table_ignores_offset() {
        let geometry = TableGeometry {
            offset: u64::MAX,
            entry_size: 56,
            entry_count: 0,
        };
        assert_eq!(geometry.records(&[], 56).unwrap().count(), 0);
    }

    #[test]
    fn table_records_zero_entry_size_uses_record_size() {
        let data: alloc::vec::Vec<u8> = (0u8..16).collect();
        let geometry = TableGeometry {
            offset: 0,
            entry_size: 0,
            entry_count: 2,
        };
        let records: alloc::vec::Vec<_> = geometry.records(&data, 8).unwrap().collect();
        assert_eq!(records, [&data[0..8], &data[8..16]]);
    }

    #[test]
    fn table_records_skip_entry_padding() {
        let data: alloc::vec::Vec<u8> = (0u8..24).collect();
        let geometry = TableGeometry {
            offset: 0,
            entry_size: 12,
            entry_count: 2,
        };
        let mut records = geometry.records(&data, 8).unwrap();
        assert_eq!(records.size_hint(), (2, Some(2)));
        assert_eq!(records.next(), Some(&data[0..8]));
        assert_eq!(records.next(), Some(&data[12..20]));
        assert_eq!(records.next(), None);
    }
}
