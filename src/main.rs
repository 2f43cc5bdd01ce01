use std::path::PathBuf;

use clap::{Parser, Subcommand};
use locsci::generate::Generate;
use locsci::logging::init_logging;
use locsci::resolution::Solve;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct LocsciTools {
    /// If present, a JSON copy of the log is written to this file
    #[arg(long, global = true)]
    log: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Generate(Generate),
    Solve(Solve),
}

fn main() -> anyhow::Result<()> {
    let cli = LocsciTools::parse();
    let _guard = init_logging(cli.log.as_ref())?;
    match cli.command {
        Command::Generate(generate) => generate.generate(),
        Command::Solve(solve) => solve.solve(),
    }
}
