//! GNU program property records and their interpretation.
//!
//! Decoding is split in two steps:
//!
//! 1. [`PropertyIter`] walks the descriptor of an `NT_GNU_PROPERTY_TYPE_0`
//!    note and yields raw [`PropertyRecord`]s. It knows nothing about what
//!    any property means.
//! 2. [`PropertyInterpreter`] maps `(owner, pr_type)` to a decoder function
//!    producing a typed [`PropertyValue`]. New encodings are added by
//!    registering a decoder; the traversal is never touched.
//!
//! Properties without a registered decoder are reported as
//! [`PropertyValue::Unrecognized`].

use alloc::vec::Vec;
use core::iter::FusedIterator;

use crate::header::{AddressWidth, ByteOrder, ElfIdentity};
use crate::note::{NoteRecord, align4};

// ---------------------------------------------------------------------------
// Property type constants
// ---------------------------------------------------------------------------

/// Stack size requested by the object (address-width integer).
pub const GNU_PROPERTY_STACK_SIZE: u32 = 1;

/// The object does not rely on copy relocations for protected symbols.
pub const GNU_PROPERTY_NO_COPY_ON_PROTECTED: u32 = 2;

/// AArch64 feature bits (`BTI`, `PAC`, `GCS`), AND-combined at link time.
pub const GNU_PROPERTY_AARCH64_FEATURE_1_AND: u32 = 0xc000_0000;

/// x86 feature bits (`IBT`, `SHSTK`), AND-combined at link time.
pub const GNU_PROPERTY_X86_FEATURE_1_AND: u32 = 0xc000_0002;

/// Owner name of GNU notes.
pub const GNU_OWNER: &[u8] = b"GNU";

/// Size of the fixed property header (`pr_type`, `pr_datasz`).
const PROPERTY_HEADER_SIZE: usize = 8;

bitflags::bitflags! {
    /// `GNU_PROPERTY_AARCH64_FEATURE_1_AND` bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Aarch64Features: u32 {
        /// Branch Target Identification.
        const BTI = 1 << 0;
        /// Pointer Authentication.
        const PAC = 1 << 1;
        /// Guarded Control Stack.
        const GCS = 1 << 2;
    }
}

bitflags::bitflags! {
    /// `GNU_PROPERTY_X86_FEATURE_1_AND` bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct X86Features: u32 {
        /// Indirect Branch Tracking.
        const IBT = 1 << 0;
        /// Shadow Stack.
        const SHSTK = 1 << 1;
    }
}

// ---------------------------------------------------------------------------
// PropertyRecord / PropertyIter
// ---------------------------------------------------------------------------

/// A single raw property from a GNU property note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyRecord<'a> {
    /// Property type (`GNU_PROPERTY_*`).
    pub pr_type: u32,
    /// Property data, without padding.
    pub data: &'a [u8],
}

/// Iterator over the property records in a note descriptor.
///
/// Stops when fewer than 8 bytes remain or a record's data runs past the
/// descriptor.
#[derive(Debug, Clone)]
pub struct PropertyIter<'a> {
    data: &'a [u8],
    byte_order: ByteOrder,
}

impl<'a> PropertyIter<'a> {
    /// Creates an iterator over the properties in `desc`.
    #[must_use]
    pub fn new(desc: &'a [u8], byte_order: ByteOrder) -> Self {
        Self {
            data: desc,
            byte_order,
        }
    }

    fn parse_next(&self) -> Option<(PropertyRecord<'a>, &'a [u8])> {
        let data = self.data;
        if data.len() < PROPERTY_HEADER_SIZE {
            return None;
        }
        let pr_type = self.byte_order.read_u32(data, 0)?;
        let datasz = usize::try_from(self.byte_order.read_u32(data, 4)?).ok()?;

        let data_end = PROPERTY_HEADER_SIZE.checked_add(datasz)?;
        let pr_data = data.get(PROPERTY_HEADER_SIZE..data_end)?;

        let next = PROPERTY_HEADER_SIZE.checked_add(align4(datasz)?)?;
        let rest = data.get(next..).unwrap_or(&[]);

        Some((
            PropertyRecord {
                pr_type,
                data: pr_data,
            },
            rest,
        ))
    }
}

impl<'a> Iterator for PropertyIter<'a> {
    type Item = PropertyRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.parse_next() {
            Some((property, rest)) => {
                self.data = rest;
                Some(property)
            }
            None => {
                self.data = &[];
                None
            }
        }
    }
}

impl FusedIterator for PropertyIter<'_> {}

/// A property annotated with the note it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyFinding<'a> {
    /// The owning note.
    pub note: NoteRecord<'a>,
    /// The property.
    pub property: PropertyRecord<'a>,
}

/// Collects the properties of every GNU property note in `notes`.
#[must_use]
pub fn collect_properties<'a>(
    notes: &[NoteRecord<'a>],
    byte_order: ByteOrder,
) -> Vec<PropertyFinding<'a>> {
    notes
        .iter()
        .filter(|note| note.is_gnu_property())
        .flat_map(|&note| {
            note.properties(byte_order)
                .map(move |property| PropertyFinding { note, property })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Interpretation
// ---------------------------------------------------------------------------

/// A typed property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyValue {
    /// `GNU_PROPERTY_STACK_SIZE`
    StackSize(u64),
    /// `GNU_PROPERTY_NO_COPY_ON_PROTECTED`
    NoCopyOnProtected,
    /// `GNU_PROPERTY_AARCH64_FEATURE_1_AND`
    Aarch64Features(Aarch64Features),
    /// `GNU_PROPERTY_X86_FEATURE_1_AND`
    X86Features(X86Features),
    /// No decoder is registered for this property, or its data did not
    /// match the decoder's expected encoding.
    Unrecognized {
        /// The raw property type.
        pr_type: u32,
    },
}

/// Decodes a property's data. Returns `None` if the data does not match the
/// expected encoding.
pub type PropertyDecoder = fn(&PropertyRecord<'_>, ElfIdentity) -> Option<PropertyValue>;

#[derive(Debug, Clone, Copy)]
struct Registration {
    owner: &'static [u8],
    pr_type: u32,
    decoder: PropertyDecoder,
}

/// Registry of property decoders keyed by `(owner name, pr_type)`.
#[derive(Debug, Clone, Default)]
pub struct PropertyInterpreter {
    decoders: Vec<Registration>,
}

impl PropertyInterpreter {
    /// Creates an interpreter with no decoders.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates an interpreter with the GNU decoders whose encodings are fixed
    /// by the gABI and the AArch64 / x86-64 psABIs.
    #[must_use]
    pub fn with_gnu_defaults() -> Self {
        let mut interp = Self::empty();
        interp.register(GNU_OWNER, GNU_PROPERTY_STACK_SIZE, decode_stack_size);
        interp.register(GNU_OWNER, GNU_PROPERTY_NO_COPY_ON_PROTECTED, decode_no_copy_on_protected);
        interp.register(GNU_OWNER, GNU_PROPERTY_AARCH64_FEATURE_1_AND, decode_aarch64_features);
        interp.register(GNU_OWNER, GNU_PROPERTY_X86_FEATURE_1_AND, decode_x86_features);
        interp
    }

    /// Registers `decoder` for `(owner, pr_type)`, replacing any earlier one.
    pub fn register(&mut self, owner: &'static [u8], pr_type: u32, decoder: PropertyDecoder) {
        self.decoders.retain(|r| !(r.owner == owner && r.pr_type == pr_type));
        self.decoders.push(Registration {
            owner,
            pr_type,
            decoder,
        });
    }

    /// Returns `true` if a decoder is registered for `(owner, pr_type)`.
    #[must_use]
    pub fn handles(&self, owner: &[u8], pr_type: u32) -> bool {
        self.lookup(owner, pr_type).is_some()
    }

    fn lookup(&self, owner: &[u8], pr_type: u32) -> Option<PropertyDecoder> {
        self.decoders
            .iter()
            .find(|r| r.owner == owner && r.pr_type == pr_type)
            .map(|r| r.decoder)
    }

    /// Interprets a property found in `finding.note`.
    #[must_use]
    pub fn interpret(&self, finding: &PropertyFinding<'_>, identity: ElfIdentity) -> PropertyValue {
        let pr_type = finding.property.pr_type;
        self.lookup(finding.note.name, pr_type)
            .and_then(|decode| decode(&finding.property, identity))
            .unwrap_or(PropertyValue::Unrecognized { pr_type })
    }
}

fn decode_u32(property: &PropertyRecord<'_>, identity: ElfIdentity) -> Option<u32> {
    if property.data.len() != 4 {
        return None;
    }
    identity.byte_order.read_u32(property.data, 0)
}

fn decode_stack_size(
    property: &PropertyRecord<'_>,
    identity: ElfIdentity,
) -> Option<PropertyValue> {
    let order = identity.byte_order;
    let size = match (identity.width, property.data.len()) {
        (AddressWidth::ThirtyTwoBit, 4) => u64::from(order.read_u32(property.data, 0)?),
        (AddressWidth::SixtyFourBit, 8) => order.read_u64(property.data, 0)?,
        _ => return None,
    };
    Some(PropertyValue::StackSize(size))
}

fn decode_no_copy_on_protected(
    property: &PropertyRecord<'_>,
    _identity: ElfIdentity,
) -> Option<PropertyValue> {
    property.data.is_empty().then_some(PropertyValue::NoCopyOnProtected)
}

fn decode_aarch64_features(
    property: &PropertyRecord<'_>,
    identity: ElfIdentity,
) -> Option<PropertyValue> {
    let bits = decode_u32(property, identity)?;
    Some(PropertyValue::Aarch64Features(Aarch64Features::from_bits_retain(bits)))
}

fn decode_x86_features(
    property: &PropertyRecord<'_>,
    identity: ElfIdentity,
) -> Option<PropertyValue> {
    let bits = decode_u32(property, identity)?;
    Some(PropertyValue::X86Features(X86Features::from_bits_retain(bits)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
