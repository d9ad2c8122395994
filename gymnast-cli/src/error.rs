// ============================================================================
// gymnast-cli/src/error.rs
// ============================================================================
//
// CLI ERRORS: every failure surfaces as a CoreError whose message names the
// step of the command that failed, e.g. "Failed to set up transcoder: ...".

use gymnast_core::{CoreError, CoreResult};

use std::fmt;
use std::path::Path;

pub type CliResult<T> = CoreResult<T>;

/// Steps of a CLI command, used as the prefix of its error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage<'a> {
    Configuration,
    MessageBus,
    Console,
    Transcoder,
    /// Running the pipeline over an input directory.
    Batch(&'a Path),
}

impl fmt::Display for Stage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Configuration => f.write_str("Invalid configuration"),
            Stage::MessageBus => f.write_str("Failed to start message bus"),
            Stage::Console => f.write_str("Failed to set up console output"),
            Stage::Transcoder => f.write_str("Failed to set up transcoder"),
            Stage::Batch(dir) => write!(f, "Processing {} failed", dir.display()),
        }
    }
}

impl Stage<'_> {
    pub fn wrap(self, err: impl Into<CoreError>) -> CoreError {
        CoreError::OperationFailed(format!("{self}: {}", err.into()))
    }
}

/// Tags a fallible step with the [`Stage`] it belongs to.
pub trait During<T> {
    fn during(self, stage: Stage<'_>) -> CliResult<T>;
}

impl<T, E: Into<CoreError>> During<T> for Result<T, E> {
    fn during(self, stage: Stage<'_>) -> CliResult<T> {
        self.map_err(|e| stage.wrap(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gymnast_core::BusError;

    #[test]
    fn test_stage_prefixes_bus_errors() {
        let result: Result<(), BusError> = Err(BusError::Stopped);
        let err = result.during(Stage::Console).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Failed to set up console output: {}", BusError::Stopped)
        );
    }

    #[test]
    fn test_batch_stage_names_the_directory() {
        let result: Result<u8, CoreError> = Err(CoreError::NoFilesFound);
        let err = result.during(Stage::Batch(Path::new("in"))).unwrap_err();
        assert!(err.to_string().starts_with("Processing in failed: "), "{err}");
    }

    #[test]
    fn test_success_passes_through() {
        let result: Result<u8, CoreError> = Ok(7);
        assert_eq!(result.during(Stage::Configuration).unwrap(), 7);
    }
}
