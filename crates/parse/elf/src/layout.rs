//! Per-width field layouts for the ELF header, program headers and section
//! headers.
//!
//! ELF32 and ELF64 differ in integer widths and, for program headers, in field
//! order (`p_flags` is the second field in ELF64 but the seventh in ELF32).
//! Every decoder in this crate reads through one of the two [`Layout`]
//! descriptors below, so there is exactly one decoding path per record kind.

use crate::header::ByteOrder;

/// Location and width of a single integer field within a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Byte offset from the start of the record.
    pub offset: usize,
    /// Width in bytes (2, 4 or 8).
    pub size: usize,
}

const fn field(offset: usize, size: usize) -> Field {
    Field { offset, size }
}

impl Field {
    /// Reads this field from `record` and widens it to `u64`.
    ///
    /// Returns `None` if the field does not fit inside `record`.
    #[must_use]
    pub fn read(self, record: &[u8], order: ByteOrder) -> Option<u64> {
        match self.size {
            2 => order.read_u16(record, self.offset).map(u64::from),
            4 => order.read_u32(record, self.offset).map(u64::from),
            8 => order.read_u64(record, self.offset),
            _ => None,
        }
    }
}

/// Table-geometry fields of the ELF file header.
#[derive(Debug, Clone, Copy)]
pub struct HeaderLayout {
    /// Size of the file header (`e_ehsize`); shorter input is truncated.
    pub size: usize,
    /// `e_phoff`
    pub phoff: Field,
    /// `e_phentsize`
    pub phentsize: Field,
    /// `e_phnum`
    pub phnum: Field,
    /// `e_shoff`
    pub shoff: Field,
    /// `e_shentsize`
    pub shentsize: Field,
    /// `e_shnum`
    pub shnum: Field,
}

/// Fields of a program header (`Elf32_Phdr` / `Elf64_Phdr`).
#[derive(Debug, Clone, Copy)]
pub struct ProgramHeaderLayout {
    /// Size of one record on disk.
    pub record_size: usize,
    /// `p_type`
    pub p_type: Field,
    /// `p_flags`
    pub p_flags: Field,
    /// `p_offset`
    pub p_offset: Field,
    /// `p_vaddr`
    pub p_vaddr: Field,
    /// `p_filesz`
    pub p_filesz: Field,
    /// `p_memsz`
    pub p_memsz: Field,
    /// `p_align`
    pub p_align: Field,
}

/// Fields of a section header (`Elf32_Shdr` / `Elf64_Shdr`) that the note
/// reader needs.
#[derive(Debug, Clone, Copy)]
pub struct SectionHeaderLayout {
    /// Size of one record on disk.
    pub record_size: usize,
    /// `sh_type`
    pub sh_type: Field,
    /// `sh_offset`
    pub sh_offset: Field,
    /// `sh_size`
    pub sh_size: Field,
}

/// Complete field layout for one ELF class.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    /// File header.
    pub header: HeaderLayout,
    /// Program header records.
    pub program_header: ProgramHeaderLayout,
    /// Section header records.
    pub section_header: SectionHeaderLayout,
}

/// Field layout for `ELFCLASS32`.
pub const LAYOUT_32: Layout = Layout {
    header: HeaderLayout {
        size: 52,
        phoff: field(28, 4),
        phentsize: field(42, 2),
        phnum: field(44, 2),
        shoff: field(32, 4),
        shentsize: field(46, 2),
        shnum: field(48, 2),
    },
    program_header: ProgramHeaderLayout {
        record_size: 32,
        p_type: field(0, 4),
        p_offset: field(4, 4),
        p_vaddr: field(8, 4),
        // p_paddr at 12
        p_filesz: field(16, 4),
        p_memsz: field(20, 4),
        p_flags: field(24, 4),
        p_align: field(28, 4),
    },
    section_header: SectionHeaderLayout {
        record_size: 40,
        sh_type: field(4, 4),
        sh_offset: field(16, 4),
        sh_size: field(20, 4),
    },
};

/// Field layout for `ELFCLASS64`.
pub const LAYOUT_64: Layout = Layout {
    header: HeaderLayout {
        size: 64,
        phoff: field(32, 8),
        phentsize: field(54, 2),
        phnum: field(56, 2),
        shoff: field(40, 8),
        shentsize: field(58, 2),
        shnum: field(60, 2),
    },
    program_header: ProgramHeaderLayout {
        record_size: 56,
        p_type: field(0, 4),
        p_flags: field(4, 4),
        p_offset: field(8, 8),
        p_vaddr: field(16, 8),
        // p_paddr at 24
        p_filesz: field(32, 8),
        p_memsz: field(40, 8),
        p_align: field(48, 8),
    },
    section_header: SectionHeaderLayout {
        record_size: 64,
        sh_type: field(4, 4),
        sh_offset: field(24, 8),
        sh_size: field(32, 8),
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    fn fields_fit(record_size: usize, fields: &[Field]) -> bool {
        fields.iter().all(|f| f.offset + f.size <= record_size)
    }

    #[test]
    fn program_header_fields_fit_records() {
        for layout in [LAYOUT_32, LAYOUT_64] {
            let ph = layout.program_header;
            let fields = [
                ph.p_type,
                ph.p_flags,
                ph.p_offset,
                ph.p_vaddr,
                ph.p_filesz,
                ph.p_memsz,
                ph.p_align,
            ];
            assert!(fields_fit(ph.record_size, &fields));
        }
    }

    #[test]
    fn section_header_fields_fit_records() {
        for layout in [LAYOUT_32, LAYOUT_64] {
            let sh = layout.section_header;
            assert!(fields_fit(sh.record_size, &[sh.sh_type, sh.sh_offset, sh.sh_size]));
        }
    }

    #[test]
    fn flags_position_differs_between_classes() {
        assert_eq!(LAYOUT_64.program_header.p_flags.offset, 4);
        assert_eq!(LAYOUT_32.program_header.p_flags.offset, 24);
    }

    #[test]
    fn address_fields_match_class_width() {
        for (layout, word) in [(LAYOUT_32, 4), (LAYOUT_64, 8)] {
            assert_eq!(layout.header.phoff.size, word);
            assert_eq!(layout.header.shoff.size, word);
            assert_eq!(layout.program_header.p_align.size, word);
            assert_eq!(layout.section_header.sh_size.size, word);
        }
    }

    #[test]
    fn header_fields_fit_header() {
        for layout in [LAYOUT_32, LAYOUT_64] {
            let h = layout.header;
            let fields = [h.phoff, h.phentsize, h.phnum, h.shoff, h.shentsize, h.shnum];
            assert!(fields_fit(h.size, &fields));
        }
    }

    #[test]
    fn field_read_rejects_out_of_bounds() {
        let record = [0u8; 6];
        assert_eq!(field(4, 4).read(&record, ByteOrder::Little), None);
        assert_eq!(field(4, 2).read(&record, ByteOrder::Little), Some(0));
    }
}
