// gymnast-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{Args, Parser, Subcommand};
use gymnast_core::SaturationPolicy;
use log::LevelFilter;
use std::path::PathBuf;

// --- CLI Argument Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "Gymnast: batch video transcoder",
    long_about = "Transcodes every video in an input directory to H.264 sized for 1080p, \
                  skipping files that already have an output."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Console log level: TRACE, DEBUG, INFO, WARN, ERROR or OFF.
    /// RUST_LOG, when set, refines it per module.
    #[arg(short = 'l', long, global = true, default_value = "WARN", value_parser = parse_log_level)]
    pub log_level: LevelFilter,

    /// Wait for Enter before exiting (useful when started from a file manager)
    #[arg(long, global = true, default_value_t = false)]
    pub pause_on_exit: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcodes pending videos from the input directory into the output directory
    Run(RunArgs),
    /// Prints source properties and the output parameters that would be used
    Probe(ProbeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Directory containing the source videos
    #[arg(short = 'i', long = "input", value_name = "INPUT_DIR", env = "GYMNAST_INPUT", default_value = "input")]
    pub input_dir: PathBuf,

    /// Directory where transcoded files are written
    #[arg(short = 'o', long = "output", value_name = "OUTPUT_DIR", env = "GYMNAST_OUTPUT", default_value = "output")]
    pub output_dir: PathBuf,

    /// ffmpeg executable
    #[arg(long, value_name = "PATH", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// mediainfo executable
    #[arg(long, value_name = "PATH", default_value = "mediainfo")]
    pub mediainfo: PathBuf,

    /// libx264 preset
    #[arg(long, value_name = "PRESET", default_value = gymnast_core::config::DEFAULT_X264_PRESET)]
    pub preset: String,

    // --- Message Bus ---
    /// Maximum number of pending console events (unbounded when omitted)
    #[arg(long, value_name = "EVENTS", value_parser = parse_capacity)]
    pub queue_capacity: Option<usize>,

    /// What to do when the event queue is full: block, drop-oldest or drop-newest
    #[arg(long, value_name = "POLICY", default_value = "block")]
    pub saturation: SaturationPolicy,
}

#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    /// Video files to inspect
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// mediainfo executable
    #[arg(long, value_name = "PATH", default_value = "mediainfo")]
    pub mediainfo: PathBuf,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// A queue capacity of at least one event.
pub fn parse_capacity(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("capacity must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Accepts the usual level names plus `WARNING`, `SUCCESS` and `CRITICAL`.
pub fn parse_log_level(value: &str) -> Result<LevelFilter, String> {
    match value.to_ascii_uppercase().as_str() {
        "TRACE" => Ok(LevelFilter::Trace),
        "DEBUG" => Ok(LevelFilter::Debug),
        "INFO" | "SUCCESS" => Ok(LevelFilter::Info),
        "WARN" | "WARNING" => Ok(LevelFilter::Warn),
        "ERROR" | "CRITICAL" => Ok(LevelFilter::Error),
        "OFF" => Ok(LevelFilter::Off),
        _ => Err(format!(
            "unknown log level '{value}' (expected TRACE, DEBUG, INFO, WARN, ERROR or OFF)"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["gymnast", "run"]).unwrap();
        assert_eq!(cli.log_level, LevelFilter::Warn);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.preset, "medium");
        assert_eq!(args.queue_capacity, None);
        assert_eq!(args.saturation, SaturationPolicy::Block);
    }

    #[test]
    fn test_run_overrides() {
        let cli = Cli::try_parse_from([
            "gymnast", "-l", "debug", "run", "-i", "src", "-o", "dst", "--preset", "slow",
            "--queue-capacity", "8", "--saturation", "drop-oldest",
        ])
        .unwrap();
        assert_eq!(cli.log_level, LevelFilter::Debug);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.input_dir, PathBuf::from("src"));
        assert_eq!(args.output_dir, PathBuf::from("dst"));
        assert_eq!(args.queue_capacity, Some(8));
        assert_eq!(args.saturation, SaturationPolicy::DropOldest);
    }

    #[test]
    fn test_zero_queue_capacity_is_rejected() {
        assert!(Cli::try_parse_from(["gymnast", "run", "--queue-capacity", "0"]).is_err());
    }

    #[test]
    fn test_log_level_names() {
        assert_eq!(parse_log_level("warning"), Ok(LevelFilter::Warn));
        assert_eq!(parse_log_level("CRITICAL"), Ok(LevelFilter::Error));
        assert_eq!(parse_log_level("Success"), Ok(LevelFilter::Info));
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_probe_requires_files() {
        assert!(Cli::try_parse_from(["gymnast", "probe"]).is_err());
        let cli = Cli::try_parse_from(["gymnast", "probe", "a.mp4", "b.mkv", "--json"]).unwrap();
        let Commands::Probe(args) = cli.command else {
            panic!("expected probe");
        };
        assert_eq!(args.files.len(), 2);
        assert!(args.json);
    }
}
