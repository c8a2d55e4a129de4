//! `app-packager` command-line entry point.
use std::process::ExitCode;

use clap::Parser;

use app_packager::cli::{Cli, Command};
use app_packager::{commands, logging};

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    logging::init_subscriber(args.verbose, args.command.name());

    let result = match &args.command {
        Command::Build(opts) => commands::build::run(opts),
        Command::Package(opts) => commands::package::run(opts),
        Command::Types => commands::list::run_types(),
        Command::Options(opts) => commands::list::run_options(opts),
        Command::Templates(opts) => commands::list::run_templates(opts),
        Command::Version => commands::version::run(),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
