//! Synthetic ELF image builder for unit tests.
//!
//! Field offsets here are written out by hand from the ELF gABI
//! rather than taken from [`crate::layout`], so tests cross-check the layout
//! tables instead of trusting them.

use alloc::vec;
use alloc::vec::Vec;

use crate::header::{AddressWidth, ByteOrder};

/// Appends `value` as a `size`-byte integer in `order`.
pub(crate) fn put(out: &mut Vec<u8>, value: u64, size: usize, order: ByteOrder) {
    let bytes = match order {
        ByteOrder::Little => value.to_le_bytes(),
        ByteOrder::Big => value.to_be_bytes(),
    };
    match order {
        ByteOrder::Little => out.extend_from_slice(&bytes[..size]),
        ByteOrder::Big => out.extend_from_slice(&bytes[8 - size..]),
    }
}

/// Writes `value` as a `size`-byte integer at `at`.
fn put_at(out: &mut [u8], at: usize, value: u64, size: usize, order: ByteOrder) {
    let mut tmp = Vec::with_capacity(size);
    put(&mut tmp, value, size, order);
    out[at..at + size].copy_from_slice(&tmp);
}

/// Pads `v` to a 4-byte boundary.
pub(crate) fn pad4(v: &mut Vec<u8>) {
    while v.len() % 4 != 0 {
        v.push(0);
    }
}

/// Encodes one note record: header, name, padding, descriptor, padding.
pub(crate) fn note(order: ByteOrder, name: &[u8], n_type: u32, desc: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    put(&mut v, name.len() as u64, 4, order);
    put(&mut v, desc.len() as u64, 4, order);
    put(&mut v, u64::from(n_type), 4, order);
    v.extend_from_slice(name);
    pad4(&mut v);
    v.extend_from_slice(desc);
    pad4(&mut v);
    v
}

/// Encodes one GNU property record: type, size, data, padding.
pub(crate) fn property(order: ByteOrder, pr_type: u32, data: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    put(&mut v, u64::from(pr_type), 4, order);
    put(&mut v, data.len() as u64, 4, order);
    v.extend_from_slice(data);
    pad4(&mut v);
    v
}

/// A program header to emit.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Phdr {
    pub p_type: u32,
    pub flags: u32,
    pub offset: u64,
    pub vaddr: u64,
    pub filesz: u64,
    pub memsz: u64,
    pub align: u64,
}

/// Builder for a minimal ELF image: header, program headers, note section
/// payloads and a section header table (null section first).
pub(crate) struct ElfImage {
    width: AddressWidth,
    order: ByteOrder,
    phdrs: Vec<Phdr>,
    note_sections: Vec<Vec<u8>>,
}

impl ElfImage {
    pub(crate) fn new(width: AddressWidth, order: ByteOrder) -> Self {
        Self {
            width,
            order,
            phdrs: Vec::new(),
            note_sections: Vec::new(),
        }
    }

    pub(crate) fn segment(mut self, phdr: Phdr) -> Self {
        self.phdrs.push(phdr);
        self
    }

    /// Adds a readable LOAD segment with the given alignment.
    pub(crate) fn load(self, align: u64) -> Self {
        let index = self.phdrs.len() as u64;
        self.segment(Phdr {
            p_type: 1,
            flags: 0b100,
            offset: index * 0x1000,
            vaddr: index * 0x1000,
            filesz: 0x800,
            memsz: 0x900,
            align,
        })
    }

    pub(crate) fn note_section(mut self, blob: Vec<u8>) -> Self {
        self.note_sections.push(blob);
        self
    }

    fn word(&self) -> usize {
        match self.width {
            AddressWidth::ThirtyTwoBit => 4,
            AddressWidth::SixtyFourBit => 8,
        }
    }

    /// Offset of the first program header (directly after the file header).
    pub(crate) fn phoff(&self) -> usize {
        match self.width {
            AddressWidth::ThirtyTwoBit => 52,
            AddressWidth::SixtyFourBit => 64,
        }
    }

    /// Size of one program header record.
    pub(crate) fn phentsize(&self) -> usize {
        match self.width {
            AddressWidth::ThirtyTwoBit => 32,
            AddressWidth::SixtyFourBit => 56,
        }
    }

    fn shentsize(&self) -> usize {
        match self.width {
            AddressWidth::ThirtyTwoBit => 40,
            AddressWidth::SixtyFourBit => 64,
        }
    }

    fn emit_phdr(&self, out: &mut Vec<u8>, p: &Phdr) {
        let (o, w) = (self.order, self.word());
        put(out, u64::from(p.p_type), 4, o);
        if self.width == AddressWidth::SixtyFourBit {
            put(out, u64::from(p.flags), 4, o);
        }
        put(out, p.offset, w, o);
        put(out, p.vaddr, w, o);
        put(out, p.vaddr, w, o); // p_paddr
        put(out, p.filesz, w, o);
        put(out, p.memsz, w, o);
        if self.width == AddressWidth::ThirtyTwoBit {
            put(out, u64::from(p.flags), 4, o);
        }
        put(out, p.align, w, o);
    }

    fn emit_shdr(&self, out: &mut Vec<u8>, sh_type: u32, offset: u64, size: u64) {
        let (o, w) = (self.order, self.word());
        put(out, 0, 4, o); // sh_name
        put(out, u64::from(sh_type), 4, o);
        put(out, 0, w, o); // sh_flags
        put(out, 0, w, o); // sh_addr
        put(out, offset, w, o);
        put(out, size, w, o);
        put(out, 0, 4, o); // sh_link
        put(out, 0, 4, o); // sh_info
        put(out, 4, w, o); // sh_addralign
        put(out, 0, w, o); // sh_entsize
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let (o, w) = (self.order, self.word());
        let phoff = self.phoff();
        let mut out = vec![0u8; phoff];

        // e_ident
        out[..4].copy_from_slice(b"\x7fELF");
        out[4] = match self.width {
            AddressWidth::ThirtyTwoBit => 1,
            AddressWidth::SixtyFourBit => 2,
        };
        out[5] = match o {
            ByteOrder::Little => 1,
            ByteOrder::Big => 2,
        };
        out[6] = 1; // EI_VERSION

        for p in &self.phdrs {
            self.emit_phdr(&mut out, p);
        }

        let mut note_locations = Vec::new();
        for blob in &self.note_sections {
            pad4(&mut out);
            note_locations.push((out.len() as u64, blob.len() as u64));
            out.extend_from_slice(blob);
        }

        while out.len() % w != 0 {
            out.push(0);
        }
        let shoff = out.len();
        self.emit_shdr(&mut out, 0, 0, 0);
        for &(offset, size) in &note_locations {
            self.emit_shdr(&mut out, 7, offset, size);
        }
        let shnum = 1 + note_locations.len() as u64;

        // Remaining header fields.
        let (e_phoff, e_shoff, e_ehsize, e_phentsize) = match self.width {
            AddressWidth::ThirtyTwoBit => (28, 32, 40, 42),
            AddressWidth::SixtyFourBit => (32, 40, 52, 54),
        };
        put_at(&mut out, 16, 3, 2, o); // e_type = ET_DYN
        put_at(&mut out, 20, 1, 4, o); // e_version
        put_at(&mut out, e_phoff, phoff as u64, w, o);
        put_at(&mut out, e_shoff, shoff as u64, w, o);
        put_at(&mut out, e_ehsize, phoff as u64, 2, o);
        put_at(&mut out, e_phentsize, self.phentsize() as u64, 2, o);
        put_at(&mut out, e_phentsize + 2, self.phdrs.len() as u64, 2, o);
        put_at(&mut out, e_phentsize + 4, self.shentsize() as u64, 2, o);
        put_at(&mut out, e_phentsize + 6, shnum, 2, o);
        out
    }
}
