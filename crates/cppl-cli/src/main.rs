//! cppl-build entry point.

use clap::Parser;
use std::process::ExitCode;

use cppl_cli::{cli, logger, report};
use cppl_driver::Driver;

const EXIT_ARGUMENT_ERROR: u8 = 1;
const EXIT_BUILD_FAILURE: u8 = 2;

fn main() -> ExitCode {
    let args = match cli::Cli::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // clap renders help/version through the same path; those are
            // not argument errors.
            let is_help = matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            );
            let _ = err.print();
            return if is_help {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_ARGUMENT_ERROR)
            };
        }
    };

    logger::init_logger(args.verbose, args.trace);

    let config = args.into_config();
    match Driver::new(config).run() {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:?}", report::driver_error_to_report(err));
            ExitCode::from(EXIT_BUILD_FAILURE)
        }
    }
}
