//! Per-file analysis and report rendering.
//!
//! [`analyze_file`] turns a path into a [`FileReport`]: an owned, serializable
//! summary of both analyses. The segment facet decides the verdict; a note
//! facet failure is recorded separately and does not fail the file.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pagecheck_elf::note::NT_GNU_BUILD_ID;
use pagecheck_elf::property::{self, Aarch64Features, X86Features};
use pagecheck_elf::{
    ByteOrder, ComplianceResult, ElfFile, LoadSegment, NoteRecord, PropertyInterpreter,
    PropertyValue,
};
use serde::Serialize;

use crate::readelf::{self, CrossCheck, NoteLister};

/// Settings shared by every file of a run.
pub struct Options<'a> {
    /// Minimum LOAD alignment in bytes.
    pub threshold: u64,
    /// External lister for `--readelf`.
    pub lister: Option<&'a dyn NoteLister>,
}

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Everything reported about one file.
#[derive(Debug, Serialize)]
pub struct FileReport {
    /// Path as given or discovered.
    pub path: PathBuf,
    /// `32` or `64`, once the header decoded.
    pub class: Option<u32>,
    /// `"little"` or `"big"`, once the header decoded.
    pub byte_order: Option<&'static str>,
    /// Segment alignment verdict.
    pub compliance: Option<ComplianceReport>,
    /// Note records.
    pub notes: Vec<NoteReport>,
    /// GNU program properties.
    pub properties: Vec<PropertyReport>,
    /// Why the notes could not be decoded.
    pub note_error: Option<String>,
    /// Why the file could not be evaluated.
    pub error: Option<String>,
    /// `--readelf` output.
    pub cross_check: Option<CrossCheck>,
}

impl FileReport {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            class: None,
            byte_order: None,
            compliance: None,
            notes: Vec::new(),
            properties: Vec::new(),
            note_error: None,
            error: None,
            cross_check: None,
        }
    }

    /// `true` if the file was evaluated and meets the threshold.
    pub fn is_compliant(&self) -> bool {
        self.error.is_none() && self.compliance.as_ref().is_some_and(|c| c.compliant)
    }
}

/// Segment alignment verdict.
#[derive(Debug, Serialize)]
pub struct ComplianceReport {
    /// Largest LOAD alignment.
    pub max_align: u64,
    /// Threshold compared against.
    pub threshold: u64,
    /// `max_align >= threshold`.
    pub compliant: bool,
    /// Number of LOAD segments.
    pub segment_count: usize,
    /// The LOAD segments.
    pub segments: Vec<SegmentReport>,
    /// Alignments that are zero or not a power of two.
    pub irregular_alignments: Vec<u64>,
}

impl From<ComplianceResult> for ComplianceReport {
    fn from(result: ComplianceResult) -> Self {
        Self {
            max_align: result.max_align,
            threshold: result.threshold,
            compliant: result.is_compliant,
            segment_count: result.segment_count,
            irregular_alignments: result.irregular_segments().map(|s| s.align).collect(),
            segments: result.segments.iter().map(SegmentReport::from).collect(),
        }
    }
}

/// One LOAD segment.
#[derive(Debug, Serialize)]
pub struct SegmentReport {
    /// File offset.
    pub offset: u64,
    /// Virtual address.
    pub vaddr: u64,
    /// Size in the file.
    pub filesz: u64,
    /// Size in memory.
    pub memsz: u64,
    /// Alignment.
    pub align: u64,
    /// `readelf`-style permissions, e.g. `R E`.
    pub flags: String,
}

impl From<&LoadSegment> for SegmentReport {
    fn from(seg: &LoadSegment) -> Self {
        Self {
            offset: seg.offset,
            vaddr: seg.vaddr,
            filesz: seg.filesz,
            memsz: seg.memsz,
            align: seg.align,
            flags: seg.flags.to_string(),
        }
    }
}

/// One note record.
#[derive(Debug, Serialize)]
pub struct NoteReport {
    /// Owner name (lossy UTF-8).
    pub owner: String,
    /// Note type.
    pub n_type: u32,
    /// Descriptor size in bytes.
    pub desc_size: usize,
    /// Hex build ID for `NT_GNU_BUILD_ID` notes.
    pub build_id: Option<String>,
}

impl From<&NoteRecord<'_>> for NoteReport {
    fn from(note: &NoteRecord<'_>) -> Self {
        let build_id =
            (note.name == b"GNU" && note.n_type == NT_GNU_BUILD_ID).then(|| hex(note.desc));
        Self {
            owner: String::from_utf8_lossy(note.name).into_owned(),
            n_type: note.n_type,
            desc_size: note.desc.len(),
            build_id,
        }
    }
}

/// One GNU program property.
#[derive(Debug, Serialize)]
pub struct PropertyReport {
    /// Owner of the containing note.
    pub owner: String,
    /// Property type.
    pub pr_type: u32,
    /// Data size in bytes.
    pub data_size: usize,
    /// Interpreted value.
    pub value: String,
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// Renders an interpreted property value.
pub fn describe(value: &PropertyValue) -> String {
    match value {
        PropertyValue::StackSize(size) => format!("stack size: {size:#x}"),
        PropertyValue::NoCopyOnProtected => "no copy on protected".to_string(),
        PropertyValue::Aarch64Features(f) => {
            let unknown = f.bits() & !Aarch64Features::all().bits();
            format!("AArch64 feature: {}", feature_names(f.iter_names().map(|(n, _)| n), unknown))
        }
        PropertyValue::X86Features(f) => {
            let unknown = f.bits() & !X86Features::all().bits();
            format!("x86 feature: {}", feature_names(f.iter_names().map(|(n, _)| n), unknown))
        }
        PropertyValue::Unrecognized { pr_type } => format!("<unrecognized type {pr_type:#x}>"),
    }
}

fn feature_names<'a>(known: impl Iterator<Item = &'a str>, unknown_bits: u32) -> String {
    let mut parts: Vec<String> = known.map(str::to_string).collect();
    if unknown_bits != 0 {
        parts.push(format!("{unknown_bits:#x}"));
    }
    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(", ")
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Reads and analyses one file. Never fails; errors end up in the report.
pub fn analyze_file(path: &Path, opts: &Options<'_>) -> FileReport {
    let mut report = FileReport::new(path);

    match std::fs::read(path).with_context(|| format!("reading {}", path.display())) {
        Ok(data) => {
            if let Err(e) = fill_report(&mut report, &data, opts.threshold) {
                report.error = Some(format!("{e:#}"));
            }
        }
        Err(e) => report.error = Some(format!("{e:#}")),
    }

    if let Some(lister) = opts.lister {
        report.cross_check = Some(readelf::cross_check(lister, path));
    }
    report
}

/// Decodes `data` into `report`.
pub fn fill_report(report: &mut FileReport, data: &[u8], threshold: u64) -> Result<()> {
    let elf = ElfFile::parse(data)?;
    let identity = elf.identity();
    report.class = Some(identity.width.bits());
    report.byte_order = Some(match identity.byte_order {
        ByteOrder::Little => "little",
        ByteOrder::Big => "big",
    });

    match elf.notes() {
        Ok(notes) => {
            report.notes = notes.iter().map(NoteReport::from).collect();
            let interp = PropertyInterpreter::with_gnu_defaults();
            report.properties = property::collect_properties(&notes, identity.byte_order)
                .iter()
                .map(|f| PropertyReport {
                    owner: String::from_utf8_lossy(f.note.name).into_owned(),
                    pr_type: f.property.pr_type,
                    data_size: f.property.data.len(),
                    value: describe(&interp.interpret(f, identity)),
                })
                .collect();
        }
        Err(e) => report.note_error = Some(e.to_string()),
    }

    report.compliance = Some(elf.compliance_with_threshold(threshold)?.into());
    Ok(())
}

// ---------------------------------------------------------------------------
// Text rendering
// ---------------------------------------------------------------------------

/// Formats a byte count in KiB: `16` for exact multiples, `15.99` otherwise.
pub fn kib(bytes: u64) -> String {
    if bytes % 1024 == 0 {
        format!("{}", bytes / 1024)
    } else {
        #[allow(clippy::cast_precision_loss)]
        let kib = bytes as f64 / 1024.0;
        format!("{kib:.2}")
    }
}

/// The default-level summary block for one file.
pub fn summary(report: &FileReport) -> String {
    let name = report
        .path
        .file_name()
        .map_or_else(|| report.path.display().to_string(), |n| n.to_string_lossy().into_owned());

    let mut out = String::new();
    let Some(c) = report.compliance.as_ref().filter(|_| report.error.is_none()) else {
        let error = report.error.as_deref().unwrap_or("unknown error");
        let _ = writeln!(out, "File: {name}");
        let _ = writeln!(out, "Error: {error}");
        return out;
    };

    #[allow(clippy::cast_precision_loss)]
    let align_kib = c.max_align as f64 / 1024.0;
    let _ = writeln!(out, "File: {name}");
    let _ = writeln!(out, "Alignment: {} bytes ({align_kib:.2} KB)", c.max_align);
    let _ = writeln!(out, "LOAD segments: {}", c.segment_count);
    if c.compliant {
        let _ = writeln!(out, "Status: COMPLIANT ({} KB+)", kib(c.threshold));
    } else {
        let _ = writeln!(out, "Status: NON-COMPLIANT (needs {} KB alignment)", kib(c.threshold));
    }
    out
}

/// The verbose-level detail for one file.
pub fn details(report: &FileReport) -> String {
    let mut out = String::new();

    if let (Some(class), Some(order)) = (report.class, report.byte_order) {
        let _ = writeln!(out, "  ELF{class}, {order}-endian");
    }

    if let Some(c) = &report.compliance {
        let _ = writeln!(out, "  LOAD segments:");
        let _ = writeln!(
            out,
            "    {:<18} {:<18} {:<12} {:<12} {:<3} {}",
            "Offset", "VirtAddr", "FileSiz", "MemSiz", "Flg", "Align"
        );
        for s in &c.segments {
            let _ = writeln!(
                out,
                "    {:<#18x} {:<#18x} {:<#12x} {:<#12x} {:<3} {:#x}",
                s.offset, s.vaddr, s.filesz, s.memsz, s.flags, s.align
            );
        }
        for align in &c.irregular_alignments {
            let _ = writeln!(out, "  warning: LOAD alignment {align:#x} is not a power of two");
        }
    }

    if let Some(error) = &report.note_error {
        let _ = writeln!(out, "  notes: {error}");
    } else if report.notes.is_empty() {
        let _ = writeln!(out, "  notes: none");
    } else {
        let _ = writeln!(out, "  notes:");
        for n in &report.notes {
            let _ = write!(out, "    {:<10} type {:#x}, {} bytes", n.owner, n.n_type, n.desc_size);
            if let Some(id) = &n.build_id {
                let _ = write!(out, ", build id {id}");
            }
            out.push('\n');
        }
    }

    for p in &report.properties {
        let _ = writeln!(out, "    property {:#x}: {}", p.pr_type, p.value);
    }

    match &report.cross_check {
        Some(CrossCheck::Listed { lines }) if lines.is_empty() => {
            let _ = writeln!(out, "  readelf: no max-page-size note found");
        }
        Some(CrossCheck::Listed { lines }) => {
            let _ = writeln!(out, "  readelf: found page-size lines:");
            for line in lines {
                let _ = writeln!(out, "    {line}");
            }
        }
        Some(CrossCheck::Unavailable { reason }) => {
            let _ = writeln!(out, "  readelf: unavailable ({reason})");
        }
        None => {}
    }
    out
}
