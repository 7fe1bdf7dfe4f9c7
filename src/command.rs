use core::fmt;
use std::{
    ffi::{OsStr, OsString},
    fmt::{Debug, Display},
    path::{Path, PathBuf},
    process::ExitStatus,
};

use stacked_errors::{DisplayStr, Result, StackableErr};

use crate::command_runner::command_runner;

/// An OS Command, this is `tokio::process::Command` wrapped with the
/// formatting the provisioning steps need. The standard streams are
/// inherited from the current process, so the operator sees the output of
/// the program unmodified.
#[derive(Clone, Default)]
pub struct Command {
    /// The program to run.
    pub program: OsString,
    /// All the arguments that will be passed to the program
    pub args: Vec<OsString>,
    /// Working directory for process. `acquire_dir_path` is used on this
    /// before spawning.
    pub cwd: Option<PathBuf>,
}

impl Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "Command {{ program: {:?},",
            DisplayStr(&self.get_unified_command()),
        ))?;
        if let Some(cwd) = &self.cwd {
            f.write_fmt(format_args!(" cwd: {cwd:?},"))?;
        }
        f.write_fmt(format_args!(" }}"))
    }
}

/// Displays the program and args interspersed with spaces, the way it would
/// be typed on a command line
impl Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.get_unified_command())
    }
}

impl Command {
    /// Creates a new `Command` for launching the `program`, inheriting the
    /// environment and working directory of the current process.
    pub fn new_os_str(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().into(),
            ..Default::default()
        }
    }

    /// Adds an argument
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().into());
        self
    }

    /// Adds arguments to be passed to the program
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|s| s.as_ref().into()));
        self
    }

    /// Sets `self.cwd`
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_owned());
        self
    }

    /// Gets the program and args interspersed with spaces
    pub(crate) fn get_unified_command(&self) -> String {
        let mut command = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            command.push(' ');
            command += arg.to_string_lossy().as_ref();
        }
        command
    }

    /// Spawns the command and waits for it to complete. Note: If this
    /// function succeeds, it only means that the OS calls all succeeded, the
    /// `status` of the result still needs to be checked.
    pub async fn run_to_completion(self) -> Result<CommandResult> {
        command_runner(self)
            .await
            .stack_err_locationless("Command::run_to_completion")?
            .wait()
            .await
    }
}

/// The result of a [Command](crate::Command)
#[must_use]
#[derive(Debug, Clone)]
pub struct CommandResult {
    // the command information is kept around for failures
    pub command: Command,
    pub status: ExitStatus,
}

impl Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("`{}` exited with {}", self.command, self.status))
    }
}
