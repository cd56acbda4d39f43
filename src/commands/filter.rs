use super::{build_params, report_stats, score_range, stream_config};
use crate::cli::FilterArgs;
use crate::pmd::{
    filters::Statistics,
    quality::QualityAdjustment,
    stream,
    workflow::{Outcome, Params},
};
use crate::utils::{open_sam_reader, Result};
use std::io::{self, BufRead, BufWriter, Write};

pub fn filter(args: FilterArgs) -> Result<()> {
    let reader = open_sam_reader(args.common.input_path.as_deref())?;
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    let stats = write_filtered(reader, &mut writer, &args)?;
    writer.flush().map_err(|e| e.to_string())?;
    report_stats(&stats, args.common.stats)
}

fn make_params(args: &FilterArgs) -> Result<Params> {
    let mut params = build_params(&args.common)?;
    params.adjustment = if args.adjust_baseq_all {
        QualityAdjustment::Universal
    } else if args.adjust_baseq {
        QualityAdjustment::Selective
    } else {
        QualityAdjustment::None
    };
    params.basic_cutoff = args.basic;
    params.compute_score = args.basic.is_none();
    params.threshold = if args.dry {
        None
    } else {
        score_range(&args.threshold)?
    };
    params.reuse_existing_score = !args.write_sam_field
        && params.adjustment == QualityAdjustment::None
        && args.basic.is_none()
        && params.min_identity.is_none()
        && !args.dry;
    Ok(params)
}

/// Writes the SAM records that pass all filters, rewritten as requested.
pub fn write_filtered<R, W>(reader: R, writer: &mut W, args: &FilterArgs) -> Result<Statistics>
where
    R: BufRead + Send,
    W: Write,
{
    let params = make_params(args)?;
    stream::run(reader, &params, &stream_config(&args.common), |outcome| {
        let line = match outcome {
            Outcome::Header(line) if args.header => line,
            Outcome::Header(_) | Outcome::Rejected { .. } => return Ok(()),
            Outcome::Accepted(rec) => {
                let damage_score = if args.write_sam_field { rec.pmd } else { None };
                if rec.rescaled_phreds.is_none() && damage_score.is_none() {
                    rec.record.line
                } else {
                    rec.record
                        .to_line(rec.rescaled_phreds.as_deref(), damage_score)
                }
            }
        };
        writeln!(writer, "{}", line).map_err(|e| format!("Failed to write output: {}", e))
    })
}
