//! Streaming driver: a reader thread feeds batches of lines to a rayon pool and the
//! calling thread consumes the outcomes in input order.

use super::{
    filters::Statistics,
    workflow::{process_line, Outcome, Params},
};
use crate::utils::Result;
use crossbeam_channel::{bounded, Receiver, Sender};
use rayon::{
    iter::{IntoParallelRefIterator, ParallelIterator},
    ThreadPool, ThreadPoolBuilder,
};
use std::{io::BufRead, thread};

const BATCH_SIZE: usize = 1024;
const CHANNEL_BUFFER_SIZE: usize = 8;

/// 1-based line number and line content.
type Batch = Vec<(usize, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub num_threads: usize,
    /// Stop after this many records reached the scoring stage.
    pub max_records: Option<u64>,
}

/// Processes every line of `reader` and hands headers and accepted records to `sink`
/// in input order.
///
/// Rejected records are only counted. The returned statistics cover every record
/// consumed before the end of input or the record limit.
pub fn run<R, F>(reader: R, params: &Params, config: &StreamConfig, mut sink: F) -> Result<Statistics>
where
    R: BufRead + Send,
    F: FnMut(Outcome) -> Result<()>,
{
    log::debug!(
        "Initializing thread pool with {} threads...",
        config.num_threads
    );
    let pool = initialize_thread_pool(config.num_threads)?;

    thread::scope(|scope| {
        let (sender, receiver) = bounded(CHANNEL_BUFFER_SIZE);
        scope.spawn(move || stream_batches_into_channel(reader, sender));
        consume_batches(receiver, &pool, params, config.max_records, &mut sink)
    })
}

fn stream_batches_into_channel<R: BufRead>(reader: R, sender: Sender<Result<Batch>>) {
    let mut batch = Vec::with_capacity(BATCH_SIZE);
    for (line_number, result_line) in reader.lines().enumerate() {
        let line = match result_line {
            Ok(line) => line,
            Err(err) => {
                let error = format!("Error at SAM line {}: {}", line_number + 1, err);
                let _ = sender.send(Err(error));
                return;
            }
        };
        if line.is_empty() {
            continue;
        }
        batch.push((line_number + 1, line));
        if batch.len() == BATCH_SIZE {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(BATCH_SIZE));
            if sender.send(Ok(full)).is_err() {
                // Consumer stopped early
                log::trace!("Line stream closed by consumer");
                return;
            }
        }
    }
    if !batch.is_empty() {
        let _ = sender.send(Ok(batch));
    }
}

fn consume_batches<F>(
    receiver: Receiver<Result<Batch>>,
    pool: &ThreadPool,
    params: &Params,
    max_records: Option<u64>,
    sink: &mut F,
) -> Result<Statistics>
where
    F: FnMut(Outcome) -> Result<()>,
{
    let mut stats = Statistics::new();
    for batch in receiver {
        let batch = batch?;
        let outcomes: Vec<Result<Outcome>> = pool.install(|| {
            batch
                .par_iter()
                .map(|(line_number, line)| {
                    process_line(line, params)
                        .map_err(|e| format!("Error at SAM line {}: {}", line_number, e))
                })
                .collect()
        });

        for outcome in outcomes {
            match outcome? {
                Outcome::Rejected {
                    rejection,
                    progress,
                } => {
                    stats.records += 1;
                    stats.reconstructed += progress.reconstructed as u64;
                    stats.processed += progress.scored as u64;
                    stats.reject(rejection);
                }
                Outcome::Accepted(rec) => {
                    stats.records += 1;
                    stats.reconstructed += rec.progress.reconstructed as u64;
                    stats.processed += rec.progress.scored as u64;
                    stats.emitted += 1;
                    sink(Outcome::Accepted(rec))?;
                }
                header @ Outcome::Header(_) => sink(header)?,
            }

            if max_records.is_some_and(|max| stats.processed >= max) {
                log::info!("Reached the limit of {} records", stats.processed);
                return Ok(stats);
            }
        }
    }
    Ok(stats)
}

fn initialize_thread_pool(num_threads: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("pmdtools-{}", i))
        .build()
        .map_err(|e| format!("Failed to initialize thread pool: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pmd::{
        filters::{AdmissionParams, Rejection},
        likelihood::ScoringParams,
        model::DamageModel,
        quality::QualityAdjustment,
    };
    use std::io::Cursor;

    fn make_params() -> Params {
        Params {
            admission: AdmissionParams {
                min_mapq: 30,
                ..Default::default()
            },
            scoring: ScoringParams {
                ancient_model: DamageModel::ancient(0.3, 0.01),
                background_model: DamageModel::background(),
                polymorphism_ancient: 0.001,
                polymorphism_contamination: 0.001,
                min_base_qual: 30,
                cpg_only: false,
            },
            min_identity: None,
            adjustment: QualityAdjustment::None,
            compute_score: true,
            collect_deamination: false,
            reuse_existing_score: false,
            basic_cutoff: None,
            threshold: None,
        }
    }

    fn make_input(num_records: usize) -> String {
        let mut input = String::from("@HD\tVN:1.6\n");
        for i in 0..num_records {
            let mapq = if i % 3 == 0 { 10 } else { 37 };
            input.push_str(&format!(
                "r{}\t0\tchr1\t{}\t{}\t10M\t*\t0\t0\tTAAAAAAAAA\tIIIIIIIIII\tMD:Z:0C9\n",
                i,
                i + 1,
                mapq
            ));
        }
        input
    }

    fn collect_names(input: &str, config: &StreamConfig) -> (Vec<String>, Statistics) {
        let mut names = Vec::new();
        let stats = run(Cursor::new(input.to_string()), &make_params(), config, |outcome| {
            match outcome {
                Outcome::Header(line) => names.push(line),
                Outcome::Accepted(rec) => names.push(rec.record.name.clone()),
                Outcome::Rejected { .. } => unreachable!(),
            }
            Ok(())
        })
        .unwrap();
        (names, stats)
    }

    #[test]
    fn output_order_and_counts_do_not_depend_on_threads() {
        let input = make_input(2500);
        let single = collect_names(
            &input,
            &StreamConfig {
                num_threads: 1,
                max_records: None,
            },
        );
        let multi = collect_names(
            &input,
            &StreamConfig {
                num_threads: 4,
                max_records: None,
            },
        );
        assert_eq!(single, multi);

        let (names, stats) = single;
        assert_eq!(names[0], "@HD\tVN:1.6");
        assert_eq!(names[1], "r1");
        assert_eq!(stats.records, 2500);
        assert_eq!(stats.rejected(Rejection::LowMappingQuality), 834);
        assert_eq!(stats.emitted, 2500 - 834);
        // Admission rejections never reach reconstruction
        assert_eq!(stats.reconstructed, stats.emitted);
    }

    #[test]
    fn record_limit_stops_the_stream() {
        let input = make_input(5000);
        let (names, stats) = collect_names(
            &input,
            &StreamConfig {
                num_threads: 2,
                max_records: Some(10),
            },
        );
        assert_eq!(stats.processed, 10);
        assert_eq!(names.len(), 11);
        assert_eq!(names.last().unwrap(), "r14");
    }

    #[test]
    fn format_error_reports_line_number() {
        let input = "@HD\tVN:1.6\nr1\t0\tchr1\t1\n";
        let err = run(
            Cursor::new(input.to_string()),
            &make_params(),
            &StreamConfig {
                num_threads: 1,
                max_records: None,
            },
            |_| Ok(()),
        )
        .unwrap_err();
        assert!(err.starts_with("Error at SAM line 2:"), "{}", err);
    }
}
