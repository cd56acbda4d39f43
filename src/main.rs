use clap::Parser;
use pmdtools::{
    cli::{init_verbose, Cli, Command, FULL_VERSION},
    commands::{alignments, deamination, filter, scores},
    utils::{handle_error_and_exit, Result},
};

fn runner() -> Result<()> {
    let cli = Cli::parse();
    init_verbose(&cli);
    let subcommand_name = match cli.command {
        Command::Filter(_) => "filter",
        Command::Scores(_) => "scores",
        Command::Alignments(_) => "alignments",
        Command::Deamination(_) => "deamination",
    };

    log::info!(
        "Running {}-{} [{}]",
        env!("CARGO_PKG_NAME"),
        *FULL_VERSION,
        subcommand_name
    );
    match cli.command {
        Command::Filter(args) => filter::filter(args)?,
        Command::Scores(args) => scores::scores(args)?,
        Command::Alignments(args) => alignments::alignments(args)?,
        Command::Deamination(args) => deamination::deamination(args)?,
    }
    log::info!("{} end", env!("CARGO_PKG_NAME"));
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
