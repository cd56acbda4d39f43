use super::{build_params, report_stats, stream_config};
use crate::cli::DeaminationArgs;
use crate::pmd::{deamination::DeaminationTable, filters::Statistics, stream, workflow::Outcome};
use crate::utils::{open_sam_reader, Result};
use std::io::{self, BufRead, BufWriter, Write};

pub fn deamination(args: DeaminationArgs) -> Result<()> {
    let reader = open_sam_reader(args.common.input_path.as_deref())?;
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    let stats = write_deamination(reader, &mut writer, &args)?;
    writer.flush().map_err(|e| e.to_string())?;
    report_stats(&stats, args.common.stats)
}

/// Accumulates substitution counts over the whole input, then writes the frequency table.
pub fn write_deamination<R, W>(reader: R, writer: &mut W, args: &DeaminationArgs) -> Result<Statistics>
where
    R: BufRead + Send,
    W: Write,
{
    let mut params = build_params(&args.common)?;
    params.compute_score = false;
    params.collect_deamination = true;

    let mut table = DeaminationTable::new();
    let stats = stream::run(reader, &params, &stream_config(&args.common), |outcome| {
        if let Outcome::Accepted(rec) = outcome {
            if let Some(record_table) = &rec.deamination {
                table.merge(record_table);
            }
        }
        Ok(())
    })?;

    if table.is_empty() {
        log::warn!("No scorable C or G positions found, the table is all zeros");
    }
    log::debug!("Writing deamination table for {} positions", args.range);
    table.write_frequencies(args.range, writer)?;
    Ok(stats)
}
