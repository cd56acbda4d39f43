use super::{build_params, report_stats, score_range, stream_config};
use crate::cli::AlignmentsArgs;
use crate::pmd::{filters::Statistics, stream, workflow::Outcome};
use crate::utils::{ascii_from_phred, open_sam_reader, Result};
use std::io::{self, BufRead, BufWriter, Write};

pub fn alignments(args: AlignmentsArgs) -> Result<()> {
    let reader = open_sam_reader(args.common.input_path.as_deref())?;
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    let stats = write_alignments(reader, &mut writer, &args)?;
    writer.flush().map_err(|e| e.to_string())?;
    report_stats(&stats, args.common.stats)
}

/// Writes read, markers, reference and qualities of every alignment in read 5' to 3'
/// orientation, each block followed by a blank line.
pub fn write_alignments<R, W>(reader: R, writer: &mut W, args: &AlignmentsArgs) -> Result<Statistics>
where
    R: BufRead + Send,
    W: Write,
{
    let mut params = build_params(&args.common)?;
    params.threshold = score_range(&args.threshold)?;

    stream::run(reader, &params, &stream_config(&args.common), |outcome| {
        let Outcome::Accepted(rec) = outcome else {
            return Ok(());
        };
        let Some(aln) = rec.alignment else {
            return Ok(());
        };
        let quals: Vec<u8> = aln.phreds.iter().map(|&q| ascii_from_phred(q)).collect();
        let markers = aln.marker_line();
        let block = [aln.read, markers, aln.reference, quals];
        for line in &block {
            writer
                .write_all(line)
                .and_then(|_| writer.write_all(b"\n"))
                .map_err(|e| format!("Failed to write output: {}", e))?;
        }
        writeln!(writer).map_err(|e| format!("Failed to write output: {}", e))
    })
}
