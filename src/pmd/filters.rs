//! Record admission filters and per-reason rejection bookkeeping.
//!
//! Admission runs as a fixed sequence of single-purpose stages over the parsed
//! record. Stages never look at the reconstructed alignment, so a rejected record
//! is never reconstructed.

use super::{
    cigar::{self, CigarKind},
    record::SamRecord,
};
use crate::utils::Result;
use std::io::Write;

/// Reason a record was skipped. Every reason has its own counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    OtherReference,
    MissingQualities,
    QualityLengthMismatch,
    TooLong,
    ContainsInsertion,
    ContainsDeletion,
    LacksInsertion,
    LacksDeletion,
    ContainsIndel,
    ContainsClip,
    LacksSoftClip,
    UnsupportedCigar,
    LowMappingQuality,
    ReverseStrand,
    MissingMd,
    MalformedMd,
    CigarLengthMismatch,
    MdLengthMismatch,
    UndefinedIdentity,
    LowIdentity,
    NoTerminalDamage,
    OutsideScoreRange,
}

impl Rejection {
    pub const ALL: [Rejection; 22] = [
        Rejection::OtherReference,
        Rejection::MissingQualities,
        Rejection::QualityLengthMismatch,
        Rejection::TooLong,
        Rejection::ContainsInsertion,
        Rejection::ContainsDeletion,
        Rejection::LacksInsertion,
        Rejection::LacksDeletion,
        Rejection::ContainsIndel,
        Rejection::ContainsClip,
        Rejection::LacksSoftClip,
        Rejection::UnsupportedCigar,
        Rejection::LowMappingQuality,
        Rejection::ReverseStrand,
        Rejection::MissingMd,
        Rejection::MalformedMd,
        Rejection::CigarLengthMismatch,
        Rejection::MdLengthMismatch,
        Rejection::UndefinedIdentity,
        Rejection::LowIdentity,
        Rejection::NoTerminalDamage,
        Rejection::OutsideScoreRange,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn description(self) -> &'static str {
        match self {
            Rejection::OtherReference => "other reference sequence",
            Rejection::MissingQualities => "no base qualities",
            Rejection::QualityLengthMismatch => "quality and sequence lengths differ",
            Rejection::TooLong => "longer than maximum length",
            Rejection::ContainsInsertion => "contains insertions",
            Rejection::ContainsDeletion => "contains deletions",
            Rejection::LacksInsertion => "no insertions",
            Rejection::LacksDeletion => "no deletions",
            Rejection::ContainsIndel => "contains indels",
            Rejection::ContainsClip => "contains clipping",
            Rejection::LacksSoftClip => "no soft clipping",
            Rejection::UnsupportedCigar => "unsupported CIGAR operation",
            Rejection::LowMappingQuality => "mapping quality too low",
            Rejection::ReverseStrand => "reverse strand",
            Rejection::MissingMd => "no MD field",
            Rejection::MalformedMd => "malformed MD field",
            Rejection::CigarLengthMismatch => "CIGAR and sequence lengths differ",
            Rejection::MdLengthMismatch => "MD and CIGAR lengths differ",
            Rejection::UndefinedIdentity => "no aligned bases for identity",
            Rejection::LowIdentity => "percent identity too low",
            Rejection::NoTerminalDamage => "no terminal C>T",
            Rejection::OutsideScoreRange => "PMD score outside threshold",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdmissionParams {
    pub contig: Option<String>,
    pub min_mapq: u8,
    pub max_len: Option<usize>,
    pub no_insertions: bool,
    pub no_deletions: bool,
    pub no_indels: bool,
    pub no_clips: bool,
    pub only_insertions: bool,
    pub only_deletions: bool,
    pub only_clips: bool,
    pub exclude_reverse: bool,
}

impl AdmissionParams {
    pub fn validate(&self) -> Result<()> {
        let conflicts = [
            (self.only_insertions && self.no_insertions, "only-insertions", "no-insertions"),
            (self.only_insertions && self.no_indels, "only-insertions", "no-indels"),
            (self.only_deletions && self.no_deletions, "only-deletions", "no-deletions"),
            (self.only_deletions && self.no_indels, "only-deletions", "no-indels"),
            (self.only_clips && self.no_clips, "only-clips", "no-clips"),
        ];
        for (conflict, first, second) in conflicts {
            if conflict {
                return Err(format!(
                    "Filters --{} and --{} are mutually exclusive",
                    first, second
                ));
            }
        }
        Ok(())
    }
}

type Stage = fn(&SamRecord, &AdmissionParams) -> Option<Rejection>;

/// Admission stages in evaluation order.
const STAGES: [Stage; 7] = [
    check_reference,
    check_qualities,
    check_indels,
    check_clips,
    check_supported_ops,
    check_mapq,
    check_strand,
];

/// Runs all admission stages; the first failing stage decides the rejection.
pub fn admit(rec: &SamRecord, params: &AdmissionParams) -> std::result::Result<(), Rejection> {
    match STAGES.iter().find_map(|stage| stage(rec, params)) {
        Some(rejection) => Err(rejection),
        None => Ok(()),
    }
}

fn check_reference(rec: &SamRecord, params: &AdmissionParams) -> Option<Rejection> {
    match &params.contig {
        Some(contig) if *contig != rec.contig => Some(Rejection::OtherReference),
        _ => None,
    }
}

fn check_qualities(rec: &SamRecord, params: &AdmissionParams) -> Option<Rejection> {
    if rec.quals.len() < 2 {
        return Some(Rejection::MissingQualities);
    }
    if rec.quals.len() != rec.bases.len() {
        return Some(Rejection::QualityLengthMismatch);
    }
    match params.max_len {
        Some(max_len) if rec.bases.len() > max_len => Some(Rejection::TooLong),
        _ => None,
    }
}

fn check_indels(rec: &SamRecord, params: &AdmissionParams) -> Option<Rejection> {
    let has_ins = cigar::has_kind(&rec.cigar, CigarKind::Insertion);
    let has_del = cigar::has_kind(&rec.cigar, CigarKind::Deletion);
    if params.no_insertions && has_ins {
        Some(Rejection::ContainsInsertion)
    } else if params.no_deletions && has_del {
        Some(Rejection::ContainsDeletion)
    } else if params.only_insertions && !has_ins {
        Some(Rejection::LacksInsertion)
    } else if params.only_deletions && !has_del {
        Some(Rejection::LacksDeletion)
    } else if params.no_indels && (has_ins || has_del) {
        Some(Rejection::ContainsIndel)
    } else {
        None
    }
}

fn check_clips(rec: &SamRecord, params: &AdmissionParams) -> Option<Rejection> {
    if params.no_clips
        && rec.cigar.iter().any(|op| {
            matches!(
                op.kind,
                CigarKind::SoftClip | CigarKind::HardClip | CigarKind::Skip | CigarKind::Pad
            )
        })
    {
        return Some(Rejection::ContainsClip);
    }
    if params.only_clips && !cigar::has_kind(&rec.cigar, CigarKind::SoftClip) {
        return Some(Rejection::LacksSoftClip);
    }
    None
}

fn check_supported_ops(rec: &SamRecord, _params: &AdmissionParams) -> Option<Rejection> {
    let kind = cigar::first_unsupported(&rec.cigar)?;
    log::warn!(
        "{} ({}:{}): CIGAR {} contains unsupported operation {:?}, only M, I, S and D are supported. The alignment has been excluded",
        rec.name,
        rec.contig,
        rec.pos,
        rec.cigar_str(),
        kind
    );
    Some(Rejection::UnsupportedCigar)
}

fn check_mapq(rec: &SamRecord, params: &AdmissionParams) -> Option<Rejection> {
    (rec.mapq < params.min_mapq).then_some(Rejection::LowMappingQuality)
}

fn check_strand(rec: &SamRecord, params: &AdmissionParams) -> Option<Rejection> {
    (params.exclude_reverse && rec.is_reverse()).then_some(Rejection::ReverseStrand)
}

/// Run-level counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Records read, headers excluded.
    pub records: u64,
    /// Records for which alignment reconstruction was attempted.
    pub reconstructed: u64,
    /// Records that reached scoring.
    pub processed: u64,
    /// Records written to the output.
    pub emitted: u64,
    rejections: [u64; Rejection::ALL.len()],
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&mut self, rejection: Rejection) {
        self.rejections[rejection.index()] += 1;
    }

    pub fn rejected(&self, rejection: Rejection) -> u64 {
        self.rejections[rejection.index()]
    }

    pub fn total_rejected(&self) -> u64 {
        self.rejections.iter().sum()
    }

    /// Writes the per-reason exclusion summary.
    pub fn write_summary<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut lines = vec![
            "---------------------------------".to_string(),
            format!("- total records: {}", self.records),
        ];
        for rejection in Rejection::ALL {
            lines.push(format!(
                "- excluded, {}: {}",
                rejection.description(),
                self.rejected(rejection)
            ));
        }
        lines.push(format!("- scored records: {}", self.processed));
        lines.push(format!("- passed records: {}", self.emitted));
        lines.push("---------------------------------".to_string());

        for line in lines {
            writeln!(writer, "{}", line).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}
