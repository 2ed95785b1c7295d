//! pydrift CLI entry point.

use clap::Parser;
use pydrift::cli::{self, Cli, Commands, EXIT_ERROR};

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Summary(args) => cli::run_summary(&args),
        Commands::Diff(args) => cli::run_diff(&args),
        Commands::Smells(args) => cli::run_smells(&args),
        Commands::Security(args) => cli::run_security(&args),
        Commands::Report(args) => cli::run_report(&args),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}
