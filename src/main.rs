//! packrat - content-based file deduplication
//!
//! Entry point for the packrat CLI application.

use std::io::IsTerminal;

use clap::Parser;
use packrat::{
    cli::Cli,
    error::{ExitCode, StructuredError},
    logging::init_logging,
};
use yansi::Paint;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version go to stdout and are not failures
            let code = if err.use_stderr() {
                ExitCode::InvalidArguments
            } else {
                ExitCode::Success
            };
            let _ = err.print();
            std::process::exit(code.as_i32());
        }
    };

    if cli.no_color || !std::io::stderr().is_terminal() {
        yansi::disable();
    }
    init_logging(cli.verbose, cli.quiet);
    let json_errors = cli.json_errors;

    match packrat::run_app(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            let exit_code = ExitCode::from_error(&err);

            if json_errors {
                let structured = StructuredError::new(&err, exit_code);
                if let Ok(json) = serde_json::to_string_pretty(&structured) {
                    eprintln!("{}", json);
                } else {
                    eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
                }
            } else {
                eprintln!(
                    "[{}] {}: {:#}",
                    exit_code.code_prefix(),
                    "Error".red().bold(),
                    err
                );
            }

            std::process::exit(exit_code.as_i32());
        }
    }
}
