//! Per-record processing: admission, reconstruction, scoring and the optional
//! rescaling and deamination collection, in that order.

use super::{
    alignment::ReconstructedAlignment,
    deamination::DeaminationTable,
    filters::{admit, AdmissionParams, Rejection},
    likelihood::{damage_sites, score_alignment, ReadScore, ScoringParams},
    quality::{rescale_qualities, QualityAdjustment},
    record::SamRecord,
};
use crate::utils::Result;

const HEADER_PREFIX: char = '@';

/// Closed-open window `[lower, upper)` on the PMD score; a missing bound is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreRange {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl ScoreRange {
    pub fn new(lower: Option<f64>, upper: Option<f64>) -> Result<Self> {
        if let (Some(lower), Some(upper)) = (lower, upper) {
            if lower >= upper {
                return Err(format!(
                    "Lower PMD threshold ({}) must be below the upper threshold ({})",
                    lower, upper
                ));
            }
        }
        Ok(ScoreRange { lower, upper })
    }

    pub fn contains(&self, pmd: f64) -> bool {
        self.lower.map_or(true, |lower| pmd >= lower) && self.upper.map_or(true, |upper| pmd < upper)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub admission: AdmissionParams,
    pub scoring: ScoringParams,
    /// Minimum damage-tolerant identity, as a fraction.
    pub min_identity: Option<f64>,
    pub adjustment: QualityAdjustment,
    pub compute_score: bool,
    pub collect_deamination: bool,
    /// Use a DS tag already present on the record instead of rescoring.
    pub reuse_existing_score: bool,
    /// Replaces scoring by a check for a C→T within this 5' distance.
    pub basic_cutoff: Option<usize>,
    pub threshold: Option<ScoreRange>,
}

/// How far a record got through the pipeline, used for the run counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub reconstructed: bool,
    pub scored: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedRecord {
    pub record: SamRecord,
    /// Absent when a pre-existing score was reused.
    pub alignment: Option<ReconstructedAlignment>,
    pub score: Option<ReadScore>,
    pub pmd: Option<f64>,
    /// Rescaled Phred values in record orientation.
    pub rescaled_phreds: Option<Vec<u8>>,
    pub deamination: Option<DeaminationTable>,
    pub progress: Progress,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Header(String),
    Rejected {
        rejection: Rejection,
        progress: Progress,
    },
    Accepted(Box<ProcessedRecord>),
}

/// Runs one input line through the pipeline.
///
/// Errors are input-format errors that make the line uninterpretable. Records that
/// are merely unsuitable come back as `Outcome::Rejected`.
pub fn process_line(line: &str, params: &Params) -> Result<Outcome> {
    if line.starts_with(HEADER_PREFIX) {
        return Ok(Outcome::Header(line.to_string()));
    }
    let record = SamRecord::parse(line)?;
    Ok(process_record(record, params))
}

pub fn process_record(record: SamRecord, params: &Params) -> Outcome {
    let mut progress = Progress::default();
    let reject = |rejection: Rejection, progress: Progress| Outcome::Rejected {
        rejection,
        progress,
    };

    if let Err(rejection) = admit(&record, &params.admission) {
        return reject(rejection, progress);
    }

    if params.reuse_existing_score && params.basic_cutoff.is_none() {
        if let Some(pmd) = record.damage_score {
            progress.scored = true;
            if !in_threshold(params, pmd) {
                return reject(Rejection::OutsideScoreRange, progress);
            }
            return accept(record, None, None, Some(pmd), None, None, progress);
        }
    }

    progress.reconstructed = true;
    let alignment = match ReconstructedAlignment::from_record(&record) {
        Ok(alignment) => alignment,
        Err(rejection) => return reject(rejection, progress),
    };

    if let Some(cutoff) = params.basic_cutoff {
        progress.scored = true;
        if !alignment.has_terminal_c_to_t(cutoff, params.scoring.min_base_qual) {
            return reject(Rejection::NoTerminalDamage, progress);
        }
        return accept(record, Some(alignment), None, None, None, None, progress);
    }

    if let Some(min_identity) = params.min_identity {
        match alignment.identity() {
            None => return reject(Rejection::UndefinedIdentity, progress),
            Some(identity) if identity < min_identity => {
                return reject(Rejection::LowIdentity, progress)
            }
            Some(_) => {}
        }
    }

    progress.scored = true;
    let score = params
        .compute_score
        .then(|| score_alignment(&alignment, &params.scoring));
    let pmd = score.map(|score| score.pmd());
    if let Some(pmd) = pmd {
        if !in_threshold(params, pmd) {
            return reject(Rejection::OutsideScoreRange, progress);
        }
    }

    let rescaled_phreds = match params.adjustment {
        QualityAdjustment::None => None,
        adjustment => {
            let phreds = rescale_qualities(
                &alignment,
                adjustment,
                &params.scoring.ancient_model,
                params.scoring.cpg_only,
            );
            Some(alignment.to_record_orientation(&phreds))
        }
    };

    let deamination = params
        .collect_deamination
        .then(|| collect_deamination(&alignment, &params.scoring));

    accept(
        record,
        Some(alignment),
        score,
        pmd,
        rescaled_phreds,
        deamination,
        progress,
    )
}

fn in_threshold(params: &Params, pmd: f64) -> bool {
    params.threshold.map_or(true, |range| range.contains(pmd))
}

fn accept(
    record: SamRecord,
    alignment: Option<ReconstructedAlignment>,
    score: Option<ReadScore>,
    pmd: Option<f64>,
    rescaled_phreds: Option<Vec<u8>>,
    deamination: Option<DeaminationTable>,
    progress: Progress,
) -> Outcome {
    Outcome::Accepted(Box::new(ProcessedRecord {
        record,
        alignment,
        score,
        pmd,
        rescaled_phreds,
        deamination,
        progress,
    }))
}

/// Counts the scorable C and G sites of one alignment.
fn collect_deamination(aln: &ReconstructedAlignment, scoring: &ScoringParams) -> DeaminationTable {
    let mut table = DeaminationTable::new();
    damage_sites(aln, scoring.cpg_only)
        .filter(|site| site.phred >= scoring.min_base_qual)
        .for_each(|site| table.add_site(&site));
    table
}
