use clap::Parser;
use std::process::ExitCode;
use svnstash::cli::output::Output;
use svnstash::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.run().map_err(anyhow::Error::new) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            Output::error(format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}
