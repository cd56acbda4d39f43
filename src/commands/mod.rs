pub mod alignments;
pub mod deamination;
pub mod filter;
pub mod scores;

use crate::cli::{CommonArgs, ThresholdArgs};
use crate::pmd::{
    filters::{AdmissionParams, Statistics},
    likelihood::ScoringParams,
    model::DamageModel,
    quality::QualityAdjustment,
    stream::StreamConfig,
    workflow::{Params, ScoreRange},
};
use crate::utils::Result;
use std::io::{self, Write};

/// Builds and validates the per-record parameters shared by all subcommands.
///
/// Subcommands adjust the output-related fields afterwards.
pub fn build_params(common: &CommonArgs) -> Result<Params> {
    if common.pmd_p + common.pmd_constant > 1.0 {
        return Err(format!(
            "PMD parameters must satisfy p + constant <= 1, got {} + {}",
            common.pmd_p, common.pmd_constant
        ));
    }

    let admission = AdmissionParams {
        contig: common.chromosome.clone(),
        min_mapq: common.min_mapq,
        max_len: common.max_length,
        no_insertions: common.no_insertions,
        no_deletions: common.no_deletions,
        no_indels: common.no_indels,
        no_clips: common.no_clips,
        only_insertions: common.only_insertions,
        only_deletions: common.only_deletions,
        only_clips: common.only_clips,
        exclude_reverse: common.not_reverse,
    };
    admission.validate()?;

    let scoring = ScoringParams {
        ancient_model: DamageModel::ancient(common.pmd_p, common.pmd_constant),
        background_model: DamageModel::background(),
        polymorphism_ancient: common.polymorphism_ancient,
        polymorphism_contamination: common.polymorphism_contamination,
        min_base_qual: common.min_baseq,
        cpg_only: common.cpg,
    };

    log::debug!("Admission: {:?}", admission);
    log::debug!("Scoring: {:?}", scoring);

    Ok(Params {
        admission,
        scoring,
        min_identity: common.perc_identity,
        adjustment: QualityAdjustment::None,
        compute_score: true,
        collect_deamination: false,
        reuse_existing_score: false,
        basic_cutoff: None,
        threshold: None,
    })
}

/// Score window from the threshold options; `None` when neither bound is set.
pub fn score_range(threshold: &ThresholdArgs) -> Result<Option<ScoreRange>> {
    match (threshold.lower, threshold.upper) {
        (None, None) => Ok(None),
        (lower, upper) => ScoreRange::new(lower, upper).map(Some),
    }
}

pub fn stream_config(common: &CommonArgs) -> StreamConfig {
    StreamConfig {
        num_threads: common.num_threads,
        max_records: common.max_records,
    }
}

/// Logs the run counters and, when requested, writes the exclusion summary to stderr.
pub fn report_stats(stats: &Statistics, write_summary: bool) -> Result<()> {
    log::info!(
        "Processed {} records: {} scored, {} written, {} excluded",
        stats.records,
        stats.processed,
        stats.emitted,
        stats.total_rejected()
    );
    if write_summary {
        let stderr = io::stderr();
        let mut handle = stderr.lock();
        stats.write_summary(&mut handle)?;
        handle.flush().map_err(|e| e.to_string())?;
    }
    Ok(())
}
