use super::{build_params, report_stats, score_range, stream_config};
use crate::cli::ScoresArgs;
use crate::pmd::{filters::Statistics, stream, workflow::Outcome};
use crate::utils::{open_sam_reader, Result};
use std::io::{self, BufRead, BufWriter, Write};

pub fn scores(args: ScoresArgs) -> Result<()> {
    let reader = open_sam_reader(args.common.input_path.as_deref())?;
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    let stats = write_scores(reader, &mut writer, &args)?;
    writer.flush().map_err(|e| e.to_string())?;
    report_stats(&stats, args.common.stats)
}

/// Writes `L_ancient`, `L_background`, their ratio and the PMD score of every
/// record in the score window, one record per line.
pub fn write_scores<R, W>(reader: R, writer: &mut W, args: &ScoresArgs) -> Result<Statistics>
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
        let Some(score) = rec.score else {
            return Ok(());
        };
        writeln!(
            writer,
            "{:.6e}\t{:.6e}\t{:.6e}\t{:.6}",
            score.ancient,
            score.background,
            score.ratio(),
            score.pmd()
        )
        .map_err(|e| format!("Failed to write output: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Cursor;

    fn run_scores(input: &str, args: &[&str]) -> Vec<Vec<f64>> {
        let args =
            ScoresArgs::try_parse_from(std::iter::once("scores").chain(args.iter().copied()))
                .unwrap();
        let mut out = Vec::new();
        write_scores(Cursor::new(input.to_string()), &mut out, &args).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| line.split('\t').map(|v| v.parse().unwrap()).collect())
            .collect()
    }

    #[test]
    fn one_row_per_scored_record() {
        let input = "@HD\tVN:1.6\n\
r1\t0\tchr1\t100\t37\t10M\t*\t0\t0\tTAAAAAAAAA\tIIIIIIIIII\tMD:Z:0C9\n\
r2\t0\tchr1\t200\t37\t10M\t*\t0\t0\tAAAAAAAAAA\tIIIIIIIIII\tMD:Z:10\n";
        let rows = run_scores(input, &[]);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.len() == 4));

        let damaged = &rows[0];
        assert!(damaged[3] > 0.0);
        assert!((damaged[2] - damaged[0] / damaged[1]).abs() / damaged[2] < 1e-5);
        assert!((damaged[3] - damaged[2].ln()).abs() < 1e-5);

        // No C or G in the second read
        assert_eq!(rows[1], vec![1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn score_window_applies() {
        let input = "r1\t0\tchr1\t100\t37\t10M\t*\t0\t0\tTAAAAAAAAA\tIIIIIIIIII\tMD:Z:0C9\n\
r2\t0\tchr1\t200\t37\t10M\t*\t0\t0\tAAAAAAAAAA\tIIIIIIIIII\tMD:Z:10\n";
        let rows = run_scores(input, &["--upper-threshold", "0"]);
        assert!(rows.is_empty());
        let rows = run_scores(input, &["--upper-threshold", "0.5"]);
        assert_eq!(rows.len(), 1);
    }
}
