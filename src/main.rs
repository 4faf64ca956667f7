use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = storyteller::cli::Cli::parse();
    match storyteller::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
