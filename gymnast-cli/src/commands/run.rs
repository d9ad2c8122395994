// ============================================================================
// gymnast-cli/src/commands/run.rs
// ============================================================================
//
// RUN COMMAND: Wires the services onto one bus and runs the batch
//
// Order matters: the config dependency must exist before the transcoder
// subscribes, and the console must subscribe before the pipeline publishes.
// The bus is shut down on every path so queued console output is flushed
// before the summary is printed.

use crate::cli::RunArgs;
use crate::error::{CliResult, During, Stage};
use crate::terminal::ConsoleService;

use gymnast_core::bus::{BusConfig, MessageBus};
use gymnast_core::external::SidecarSpawner;
use gymnast_core::media::MediaInfoProbe;
use gymnast_core::messages::{ConsoleColor, PrintToConsole};
use gymnast_core::services::CONFIG_DEPENDENCY;
use gymnast_core::{CoreConfig, PipelineService, PipelineSummary, TranscoderService};

/// Builds the core configuration from command-line arguments.
pub fn build_config(args: &RunArgs) -> CoreConfig {
    let mut config = CoreConfig::new(args.input_dir.clone(), args.output_dir.clone());
    config.ffmpeg_bin = args.ffmpeg.clone();
    config.mediainfo_bin = args.mediainfo.clone();
    config.x264_preset = args.preset.clone();
    config.bus = BusConfig {
        queue_capacity: args.queue_capacity,
        saturation: args.saturation,
        ..BusConfig::default()
    };
    config
}

/// Runs the batch described by `args` and returns its summary.
pub fn run_transcode(args: RunArgs) -> CliResult<PipelineSummary> {
    let config = build_config(&args);
    config.validate().during(Stage::Configuration)?;
    log::debug!("Using configuration: {:?}", config);

    let bus = MessageBus::with_config(config.bus.clone()).during(Stage::MessageBus)?;
    let result = run_on_bus(&bus, &config);
    bus.shutdown();

    let stats = bus.stats();
    if stats.dropped > 0 || stats.handler_failures > 0 {
        log::warn!(
            "Console dropped {} event(s), {} handler failure(s)",
            stats.dropped,
            stats.handler_failures
        );
    }
    result
}

fn run_on_bus(bus: &MessageBus, config: &CoreConfig) -> CliResult<PipelineSummary> {
    bus.set_dependency(CONFIG_DEPENDENCY, config.clone())?;
    ConsoleService::register(bus).during(Stage::Console)?;
    TranscoderService::register(bus, SidecarSpawner).during(Stage::Transcoder)?;

    bus.execute(PrintToConsole {
        msg: format!(
            "{} -> {}",
            config.input_dir.display(),
            config.output_dir.display()
        ),
        color: ConsoleColor::Green,
    })?;

    let pipeline = PipelineService::new(bus.clone(), MediaInfoProbe::new(&config.mediainfo_bin));
    pipeline
        .run(config)
        .during(Stage::Batch(&config.input_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gymnast_core::SaturationPolicy;
    use std::path::PathBuf;

    fn args() -> RunArgs {
        RunArgs {
            input_dir: PathBuf::from("in"),
            output_dir: PathBuf::from("out"),
            ffmpeg: PathBuf::from("/opt/ffmpeg"),
            mediainfo: PathBuf::from("mediainfo"),
            preset: "fast".to_string(),
            queue_capacity: Some(4),
            saturation: SaturationPolicy::DropNewest,
        }
    }

    #[test]
    fn test_build_config() {
        let config = build_config(&args());
        assert_eq!(config.ffmpeg_bin, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(config.x264_preset, "fast");
        assert_eq!(config.bus.queue_capacity, Some(4));
        assert_eq!(config.bus.saturation, SaturationPolicy::DropNewest);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_preset_is_reported() {
        let mut args = args();
        args.preset = "ludicrous".to_string();
        let err = run_transcode(args).unwrap_err();
        assert!(err.to_string().starts_with("Invalid configuration"));
    }
}
