// gymnast-cli/src/main.rs
//
// Entry point for the `gymnast` binary: parses arguments, sets up logging,
// dispatches the subcommand and maps the outcome to an exit code.

use clap::Parser;
use console::style;
use gymnast_cli::logging::init_logging;
use gymnast_cli::{Cli, Commands, run_probe, run_transcode};
use std::io::{self, BufRead, Write};
use std::process;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let result = match cli.command {
        Commands::Run(args) => run_transcode(args).map(|summary| {
            if summary.pending > 0 {
                println!(
                    "Transcoded: {}, kept source: {}, failed: {}",
                    summary.transcoded, summary.kept_source, summary.failed
                );
            }
        }),
        Commands::Probe(args) => run_probe(args),
    };

    let code = match result {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("{} {}", style("Error:").red().bold(), e);
            1
        }
    };

    if cli.pause_on_exit {
        pause();
    }
    process::exit(code);
}

fn pause() {
    print!("Press Enter to exit...");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
}
