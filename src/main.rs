//! uitest - scripted UI-test runner
//!
//! Runs a script of `click(#go)`-style commands against a document and
//! prints a pass/fail report.

use clap::Parser;
use uitest::cli;
use uitest::commands::Commands;
use uitest::common::logging;

#[derive(Parser)]
#[command(name = "uitest", about = "Scripted UI-test runner")]
#[command(version, long_about = None)]
struct Cli {
    /// Log every executed command, including injected waits and focus checks
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init_cli(cli.verbose);

    if let Err(e) = cli::dispatch(cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
