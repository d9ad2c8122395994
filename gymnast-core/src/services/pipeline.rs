//! Batch driver: prepares the workspace, finds pending files and walks them
//! through probing, parameter selection and transcoding.

use crate::bus::MessageBus;
use crate::config::CoreConfig;
use crate::discovery::{pending_files, prepare_workspace};
use crate::error::CoreResult;
use crate::media::{MediaProbe, OutputMediaParams, SourceMediaInfo, build_media_params};
use crate::messages::{
    AppFailure, ConsoleColor, FileDataProcessed, FilesToTranscode, NoFilesToTranscode, RunTranscode,
};

use std::path::Path;

/// Message shown when every input already has an output.
pub const NO_FILES_MESSAGE: &str = "No files to transcode";

/// Counts for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Files that had no output yet
    pub pending: usize,
    /// Files replaced by a smaller transcode
    pub transcoded: usize,
    /// Files whose transcode came out larger, so the source was copied
    pub kept_source: usize,
    /// Files that failed to probe or transcode
    pub failed: usize,
}

pub struct PipelineService<P> {
    bus: MessageBus,
    probe: P,
}

impl<P: MediaProbe> PipelineService<P> {
    pub fn new(bus: MessageBus, probe: P) -> Self {
        Self { bus, probe }
    }

    /// Processes every pending file in `config.input_dir`.
    ///
    /// Per-file failures are published as [`AppFailure`] and the batch goes on.
    /// Bus configuration errors, such as a missing transcoder, abort the run.
    pub fn run(&self, config: &CoreConfig) -> CoreResult<PipelineSummary> {
        prepare_workspace(config)?;
        let todo = pending_files(config)?;
        let mut summary = PipelineSummary {
            pending: todo.len(),
            ..PipelineSummary::default()
        };

        if todo.is_empty() {
            log::info!("Nothing to do in {}", config.input_dir.display());
            self.bus.emit(NoFilesToTranscode {
                msg: NO_FILES_MESSAGE.to_string(),
                color: ConsoleColor::Yellow,
            })?;
            return Ok(summary);
        }

        log::info!("{} file(s) to transcode", todo.len());
        self.bus.emit(FilesToTranscode { files: todo.clone() })?;

        for input_file in todo {
            let params = match self.prepare(&input_file) {
                Ok((source, params)) => {
                    self.bus.emit(FileDataProcessed {
                        input_file: input_file.clone(),
                        source,
                        params: params.clone(),
                    })?;
                    params
                }
                Err(e) => {
                    log::error!("Skipping {}: {}", input_file.display(), e);
                    summary.failed += 1;
                    self.bus.emit(AppFailure { msg: e.to_string() })?;
                    continue;
                }
            };

            match self.bus.execute(RunTranscode { input_file, params }) {
                Ok(outcome) if outcome.ok => summary.transcoded += 1,
                Ok(outcome) if outcome.output_file.is_some() => summary.kept_source += 1,
                Ok(_) => summary.failed += 1,
                Err(e) if e.is_configuration() => return Err(e.into()),
                Err(e) => {
                    summary.failed += 1;
                    self.bus.emit(AppFailure { msg: e.to_string() })?;
                }
            }
        }

        log::debug!("Batch finished: {:?}", summary);
        Ok(summary)
    }

    fn prepare(&self, input_file: &Path) -> CoreResult<(SourceMediaInfo, OutputMediaParams)> {
        let source = self.probe.probe(input_file)?;
        let params = build_media_params(&source);
        log::debug!("{}: {:?} -> {:?}", input_file.display(), source, params);
        Ok((source, params))
    }
}
