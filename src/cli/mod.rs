// CLI module
// Command-line interface and argument parsing

mod args;

pub use args::{CliArgs, StrategyType};

use crate::core::FeeSchedule;
use crate::types::FeeConfigError;
use clap::Parser;

/// Parse command-line arguments using clap
///
/// On invalid arguments or `--help`, clap prints the message and exits the
/// process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

/// Fee schedule named by `--fee-schedule`, or the built-in one
pub fn load_fee_schedule(args: &CliArgs) -> Result<FeeSchedule, FeeConfigError> {
    match &args.fee_schedule {
        Some(path) => FeeSchedule::from_yaml_file(path),
        None => Ok(FeeSchedule::standard()),
    }
}
