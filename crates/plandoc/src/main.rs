mod args;
mod commands;
mod summary;

use std::io;

use clap::Parser;
use tracing::Level;

use crate::args::LogFormatArg;
use crate::commands::Commands;

#[derive(Parser)]
#[clap(name = "plandoc")]
#[clap(version)]
#[clap(about = "Inspect and verify encoded SQL plan documents", long_about = None)]
struct Arguments {
    /// Log level used when RUST_LOG isn't set.
    #[clap(long, global = true, default_value = "warn", env = "PLANDOC_LOG_LEVEL")]
    log_level: Level,

    /// Format of log lines written to stderr.
    #[clap(long, global = true, value_enum, default_value_t = LogFormatArg::Human)]
    log_format: LogFormatArg,

    #[clap(subcommand)]
    command: Commands,
}

fn main() {
    let args = Arguments::parse();
    logutil::configure_global_logger(args.log_level, args.log_format.into(), io::stderr);

    // Nested result. Outer result for the panic, inner is the command result.
    let result = std::panic::catch_unwind(|| args.command.run());

    match result {
        Ok(Err(err)) => {
            eprintln!("ERROR: {err}");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("PANIC: {err:?}");
            std::process::exit(2);
        }
        Ok(Ok(())) => (),
    }
}
