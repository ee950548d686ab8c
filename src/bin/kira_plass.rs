use std::process::ExitCode;

use clap::Parser;

use kira_plass_runner::cli::{self, LegacyCli};
use kira_plass_runner::error::KiraError;

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(kira.exit_code());
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> miette::Result<()> {
    let args = LegacyCli::parse();
    cli::execute(&args.settings(), args.common.config.as_deref(), args.common.json)?;
    Ok(())
}
