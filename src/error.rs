use std::{path::PathBuf, process::ExitStatus};

/// Exit code for a missing or unloadable configuration
pub const CONFIGURATION_EXIT_CODE: i32 = 2;
/// Exit code used after Ctrl-C
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Everything that can stop [Provisioner::provision](crate::Provisioner::provision)
///
/// None of these are recovered from internally, they all end the process
/// with [ProvisionError::exit_code].
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Required values are absent or empty, detected before any command runs
    #[error(
        "missing required configuration {} in the .env file or environment",
        .missing.join(", ")
    )]
    Configuration { missing: Vec<&'static str> },
    /// An explicitly requested env file could not be read or parsed
    #[error("could not load env file {path:?}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    /// A value in the process environment is not valid unicode
    #[error("{key} in the environment is not valid unicode")]
    NotUnicode { key: String },
    #[error("image build failed ({status})")]
    BuildFailure { status: ExitStatus },
    #[error("container run failed ({status})")]
    RunFailure { status: ExitStatus },
    #[error("interrupted before the container was started")]
    Interrupted,
    /// The container tool could not be spawned or waited on
    #[error("{0}")]
    Command(stacked_errors::Error),
}

impl ProvisionError {
    /// The process exit code for this error. Build and run failures pass
    /// through the code of the failed subprocess.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProvisionError::Configuration { .. }
            | ProvisionError::EnvFile { .. }
            | ProvisionError::NotUnicode { .. } => CONFIGURATION_EXIT_CODE,
            ProvisionError::BuildFailure { status } | ProvisionError::RunFailure { status } => {
                match status.code() {
                    Some(0) | None => 1,
                    Some(code) => code,
                }
            }
            ProvisionError::Interrupted => INTERRUPTED_EXIT_CODE,
            ProvisionError::Command(_) => 1,
        }
    }
}

impl From<stacked_errors::Error> for ProvisionError {
    fn from(e: stacked_errors::Error) -> Self {
        ProvisionError::Command(e)
    }
}
