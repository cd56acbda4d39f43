use crate::utils::Result;
use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| {
    format!(
        "{}-{}",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    )
});

#[derive(Parser)]
#[command(name="pmdtools",
          author="PMDtools developers",
          version=&**FULL_VERSION,
          about="Post-mortem damage scoring and filtering of ancient DNA alignments",
          long_about = None,
          disable_help_subcommand = true,
          help_template = "{name} {version}\n{author}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Output SAM records that pass the PMD score filter")]
    Filter(FilterArgs),
    #[clap(about = "Output PMD likelihoods and scores per read")]
    Scores(ScoresArgs),
    #[clap(about = "Output reconstructed read-to-reference alignments")]
    Alignments(AlignmentsArgs),
    #[clap(about = "Output substitution frequencies by distance from the read ends")]
    Deamination(DeaminationArgs),
}

/// Input, admission and damage model options shared by all subcommands.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(help = "SAM file, optionally gzip compressed [default: stdin]")]
    #[clap(value_name = "SAM")]
    #[arg(value_parser = check_input_path)]
    pub input_path: Option<PathBuf>,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(short = 'n')]
    #[clap(long = "number")]
    #[clap(help = "Stop after this many records were scored")]
    #[clap(value_name = "NUMBER")]
    pub max_records: Option<u64>,

    #[clap(short = 'c')]
    #[clap(long = "chromosome")]
    #[clap(help = "Only process records aligned to this reference sequence")]
    #[clap(value_name = "CHROM")]
    pub chromosome: Option<String>,

    #[clap(short = 'm')]
    #[clap(long = "min-mapq")]
    #[clap(help = "Minimum mapping quality")]
    #[clap(value_name = "MAPQ")]
    #[clap(default_value = "0")]
    pub min_mapq: u8,

    #[clap(short = 'q')]
    #[clap(long = "min-baseq")]
    #[clap(help = "Minimum base quality of scored positions")]
    #[clap(value_name = "BASEQ")]
    #[clap(default_value = "0")]
    pub min_baseq: u8,

    #[clap(short = 'l')]
    #[clap(long = "max-length")]
    #[clap(help = "Maximum read length")]
    #[clap(value_name = "LENGTH")]
    pub max_length: Option<usize>,

    #[clap(long = "cpg")]
    #[clap(help = "Only use C>T and G>A sites in CpG context")]
    pub cpg: bool,

    #[clap(long = "perc-identity")]
    #[clap(help = "Minimum fraction of identical bases, not counting C>T and G>A")]
    #[clap(value_name = "FRAC")]
    #[arg(value_parser = ensure_unit_float)]
    pub perc_identity: Option<f64>,

    #[clap(long = "not-reverse")]
    #[clap(help = "Exclude reverse strand alignments")]
    pub not_reverse: bool,

    #[clap(long = "stats")]
    #[clap(help = "Write a summary of excluded records to stderr")]
    pub stats: bool,

    #[clap(help_heading("Model"))]
    #[clap(long = "pmd-p")]
    #[clap(value_name = "P")]
    #[clap(help = "Geometric decay parameter of the damage curve")]
    #[clap(default_value = "0.3")]
    #[arg(value_parser = ensure_unit_float)]
    pub pmd_p: f64,

    #[clap(help_heading("Model"))]
    #[clap(long = "pmd-constant")]
    #[clap(value_name = "C")]
    #[clap(help = "Damage rate far from the read ends")]
    #[clap(default_value = "0.01")]
    #[arg(value_parser = ensure_unit_float)]
    pub pmd_constant: f64,

    #[clap(help_heading("Model"))]
    #[clap(long = "polymorphism-ancient")]
    #[clap(value_name = "RATE")]
    #[clap(help = "True divergence between the ancient sample and the reference")]
    #[clap(default_value = "0.001")]
    #[arg(value_parser = ensure_unit_float)]
    pub polymorphism_ancient: f64,

    #[clap(help_heading("Model"))]
    #[clap(long = "polymorphism-contamination")]
    #[clap(value_name = "RATE")]
    #[clap(help = "True divergence between the contaminants and the reference")]
    #[clap(default_value = "0.001")]
    #[arg(value_parser = ensure_unit_float)]
    pub polymorphism_contamination: f64,

    #[clap(help_heading("Alignment filters"))]
    #[clap(long = "no-insertions")]
    #[clap(help = "Exclude alignments with insertions")]
    pub no_insertions: bool,

    #[clap(help_heading("Alignment filters"))]
    #[clap(long = "no-deletions")]
    #[clap(help = "Exclude alignments with deletions")]
    pub no_deletions: bool,

    #[clap(help_heading("Alignment filters"))]
    #[clap(long = "no-indels")]
    #[clap(help = "Exclude alignments with insertions or deletions")]
    pub no_indels: bool,

    #[clap(help_heading("Alignment filters"))]
    #[clap(long = "no-clips")]
    #[clap(help = "Exclude clipped alignments")]
    pub no_clips: bool,

    #[clap(help_heading("Alignment filters"))]
    #[clap(long = "only-insertions")]
    #[clap(help = "Only use alignments with insertions")]
    #[clap(conflicts_with_all = ["no_insertions", "no_indels"])]
    pub only_insertions: bool,

    #[clap(help_heading("Alignment filters"))]
    #[clap(long = "only-deletions")]
    #[clap(help = "Only use alignments with deletions")]
    #[clap(conflicts_with_all = ["no_deletions", "no_indels"])]
    pub only_deletions: bool,

    #[clap(help_heading("Alignment filters"))]
    #[clap(long = "only-clips")]
    #[clap(help = "Only use soft-clipped alignments")]
    #[clap(conflicts_with = "no_clips")]
    pub only_clips: bool,
}

/// PMD score window, `LOWER <= score < UPPER`.
#[derive(Args, Debug, Clone)]
pub struct ThresholdArgs {
    #[clap(long = "threshold")]
    #[clap(help = "Lower PMD score threshold (inclusive)")]
    #[clap(value_name = "LOWER")]
    #[clap(allow_hyphen_values = true)]
    pub lower: Option<f64>,

    #[clap(long = "upper-threshold")]
    #[clap(help = "Upper PMD score threshold (exclusive)")]
    #[clap(value_name = "UPPER")]
    #[clap(allow_hyphen_values = true)]
    pub upper: Option<f64>,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("filter")))]
pub struct FilterArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub threshold: ThresholdArgs,

    #[clap(short = 'a')]
    #[clap(long = "adjustbaseq")]
    #[clap(help = "Lower the quality of C>T and G>A bases by their damage probability")]
    pub adjust_baseq: bool,

    #[clap(long = "adjustbaseq-all")]
    #[clap(help = "Lower the quality of all bases by their damage probability")]
    #[clap(conflicts_with = "adjust_baseq")]
    pub adjust_baseq_all: bool,

    #[clap(long = "writesamfield")]
    #[clap(help = "Add the PMD score as a DS:Z field, replacing any existing one")]
    pub write_sam_field: bool,

    #[clap(long = "header")]
    #[clap(help = "Output SAM header lines")]
    pub header: bool,

    #[clap(long = "dry")]
    #[clap(help = "Score records but do not filter on the score")]
    pub dry: bool,

    #[clap(help_heading("Advanced"))]
    #[clap(short = 'b')]
    #[clap(long = "basic")]
    #[clap(value_name = "DISTANCE")]
    #[clap(help = "Instead of scoring, keep reads with a C>T within this distance of the 5' end")]
    #[clap(conflicts_with_all = ["adjust_baseq", "adjust_baseq_all", "write_sam_field", "dry"])]
    pub basic: Option<usize>,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("scores")))]
pub struct ScoresArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub threshold: ThresholdArgs,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("alignments")))]
pub struct AlignmentsArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub threshold: ThresholdArgs,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("deamination")))]
pub struct DeaminationArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[clap(long = "range")]
    #[clap(value_name = "RANGE")]
    #[clap(help = "Number of positions from each read end to report")]
    #[clap(default_value = "30")]
    pub range: usize,
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn threads_in_range(s: &str) -> Result<usize> {
    let thread: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid thread number", s))?;
    if thread >= 1 {
        Ok(thread)
    } else {
        Err("Number of threads must be at least 1".into())
    }
}

/// Accepts an existing file or `-` for stdin.
fn check_input_path(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if s != "-" && !path.exists() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn ensure_unit_float(s: &str) -> Result<f64> {
    let value = s
        .parse::<f64>()
        .map_err(|e| format!("Could not parse float: {}", e))?;
    if !(0.0..=1.0).contains(&value) {
        Err(format!(
            "The value must be between 0.0 and 1.0, got: {}",
            value
        ))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("pmdtools").chain(args.iter().copied()))
    }

    #[test]
    fn filter_defaults() {
        let cli = parse(&["filter"]).unwrap();
        let Command::Filter(args) = cli.command else {
            panic!("Expected filter subcommand");
        };
        assert_eq!(args.common.num_threads, 1);
        assert_eq!(args.common.pmd_p, 0.3);
        assert_eq!(args.common.pmd_constant, 0.01);
        assert!(args.common.input_path.is_none());
        assert!(args.threshold.lower.is_none());
        assert!(args.basic.is_none());
    }

    #[test]
    fn negative_threshold_is_accepted() {
        let cli = parse(&["scores", "--threshold", "-2.5", "--upper-threshold", "3"]).unwrap();
        let Command::Scores(args) = cli.command else {
            panic!("Expected scores subcommand");
        };
        assert_eq!(args.threshold.lower, Some(-2.5));
        assert_eq!(args.threshold.upper, Some(3.0));
    }

    #[test]
    fn conflicting_filters_are_rejected() {
        assert!(parse(&["filter", "--only-clips", "--no-clips"]).is_err());
        assert!(parse(&["filter", "--only-insertions", "--no-indels"]).is_err());
        assert!(parse(&["filter", "--adjustbaseq", "--adjustbaseq-all"]).is_err());
        assert!(parse(&["filter", "--basic", "5", "--writesamfield"]).is_err());
    }

    #[test]
    fn zero_threads_and_out_of_range_rates_are_rejected() {
        assert!(parse(&["scores", "--threads", "0"]).is_err());
        assert!(parse(&["scores", "--pmd-p", "1.5"]).is_err());
        assert!(parse(&["alignments", "--perc-identity", "-0.1"]).is_err());
    }

    #[test]
    fn input_path_must_exist_unless_stdin() {
        assert!(parse(&["deamination", "--input", "/nonexistent/reads.sam"]).is_err());
        let cli = parse(&["deamination", "--input", "-", "--range", "10"]).unwrap();
        let Command::Deamination(args) = cli.command else {
            panic!("Expected deamination subcommand");
        };
        assert_eq!(args.range, 10);
        assert_eq!(args.common.input_path, Some(PathBuf::from("-")));
    }
}
