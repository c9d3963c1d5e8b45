use std::process::ExitCode;

use clap::Parser;
use memerist::cli::{self, CliArgs};
use memerist::{log_info, logger};

fn main() -> ExitCode {
    let args = CliArgs::parse();
    logger::init(args.verbose);

    log_info!("Rendering {}", args.base.display());
    cli::run(args)
}
