use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use stacked_errors::StackableErr;
use tracing::{debug, info};

use crate::{Command, ProvisionConfig, ProvisionError, CTRLC_ISSUED};

/// The tag of the built image
pub const IMAGE_NAME: &str = "iam-secure";
/// The build context, relative to the working directory of the commands
pub const BUILD_CONTEXT: &str = ".";
pub const DEFAULT_PROGRAM: &str = "docker";

/// Builds the `iam-secure` image and starts a detached container from it.
///
/// ```
/// use iam_provision::{MapSource, ProvisionConfig, Provisioner};
///
/// let source = MapSource::new()
///     .with("SERVER_IP", "127.0.0.1")
///     .with("SERVER_PORT", "8080")
///     .with("DOCKER_EXPOSED_PORT", "80");
/// let config = ProvisionConfig::from_source(&source).unwrap();
/// let provisioner = Provisioner::new(config).program("podman");
/// assert_eq!(
///     provisioner.build_command().to_string(),
///     "podman build -t iam-secure ."
/// );
/// assert_eq!(
///     provisioner.run_command().to_string(),
///     "podman run -d -p 127.0.0.1:8080:80 iam-secure"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Provisioner {
    config: ProvisionConfig,
    program: OsString,
    cwd: Option<PathBuf>,
    interrupt: &'static AtomicBool,
}

impl Provisioner {
    pub fn new(config: ProvisionConfig) -> Self {
        Self {
            config,
            program: DEFAULT_PROGRAM.into(),
            cwd: None,
            interrupt: &CTRLC_ISSUED,
        }
    }

    /// Sets the container tool, `docker` by default
    pub fn program(mut self, program: impl AsRef<OsStr>) -> Self {
        self.program = program.as_ref().into();
        self
    }

    /// Sets the directory both commands run in, which the `.` build context is
    /// relative to
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_owned());
        self
    }

    /// Sets the flag checked between the build and run steps, [CTRLC_ISSUED]
    /// by default
    pub fn interrupt_flag(mut self, interrupt: &'static AtomicBool) -> Self {
        self.interrupt = interrupt;
        self
    }

    fn command(&self) -> Command {
        let command = Command::new_os_str(&self.program);
        match &self.cwd {
            Some(cwd) => command.cwd(cwd),
            None => command,
        }
    }

    /// `<program> build -t iam-secure .`
    pub fn build_command(&self) -> Command {
        self.command()
            .args(["build", "-t", IMAGE_NAME, BUILD_CONTEXT])
    }

    /// `<program> run -d -p <host_address>:<host_port>:<container_port>
    /// iam-secure`
    pub fn run_command(&self) -> Command {
        self.command()
            .args(["run", "-d", "-p"])
            .arg(self.config.port_mapping())
            .arg(IMAGE_NAME)
    }

    /// Runs the build command and then, only if it succeeded, the run
    /// command. Each command line is printed before it is executed, and the
    /// standard streams of the container tool are passed through unmodified.
    ///
    /// This is not idempotent, every call rebuilds the image and starts
    /// another container. Nothing is cleaned up on failure.
    pub async fn provision(&self) -> Result<(), ProvisionError> {
        let build = self.build_command();
        println!("Building Docker image: {build}");
        let comres = build
            .run_to_completion()
            .await
            .stack_err_locationless("Provisioner::provision -> build step")?;
        debug!("{comres}");
        if !comres.status.success() {
            return Err(ProvisionError::BuildFailure {
                status: comres.status,
            })
        }
        info!("built image {IMAGE_NAME}");

        if self.interrupt.swap(false, Ordering::SeqCst) {
            return Err(ProvisionError::Interrupted)
        }

        let run = self.run_command();
        println!("Running Docker container: {run}");
        let comres = run
            .run_to_completion()
            .await
            .stack_err_locationless("Provisioner::provision -> run step")?;
        debug!("{comres}");
        if !comres.status.success() {
            return Err(ProvisionError::RunFailure {
                status: comres.status,
            })
        }
        info!("container started from {IMAGE_NAME}");
        Ok(())
    }
}
