use std::process::ExitCode;

use clap::Parser;

use retropaint::cli::{self, CliArgs};
use retropaint::logger;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    logger::set_echo_stderr(args.verbose);
    logger::init();
    retropaint::log_info!("cli: {:?}", std::env::args().skip(1).collect::<Vec<_>>());

    cli::run(args)
}
