use std::process::Stdio;

use stacked_errors::{Result, StackableErr};
use tokio::process::{self, Child};
use tracing::debug;

use crate::{acquire_dir_path, Command, CommandResult};

// note that most things should use `_locationless`, especially if they are
// expected to be able to error under normal `Command` running circumstances,
// the string info should be enough

/// A spawned `Command`
#[must_use]
#[derive(Debug)]
pub(crate) struct CommandRunner {
    // this information is kept around for failures
    command: Command,
    child_process: Child,
}

pub(crate) async fn command_runner(this: Command) -> Result<CommandRunner> {
    let mut cmd = process::Command::new(&this.program);
    if let Some(ref cwd) = this.cwd {
        let cwd = acquire_dir_path(cwd)
            .await
            .stack_err_with_locationless(|| {
                format!("{this:?}.run() -> failed to acquire current working directory")
            })?;
        cmd.current_dir(cwd);
    }
    // not killed on drop, a detached `docker run` should not depend on us
    let child = cmd
        .args(&this.args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .stack_err_with_locationless(|| {
            format!("{this:?}.run() -> failed to spawn child process")
        })?;
    debug!("spawned `{this}` with pid {:?}", child.id());
    Ok(CommandRunner {
        command: this,
        child_process: child,
    })
}

impl CommandRunner {
    /// Waits for the child to exit (or stalls forever if the OS command does)
    pub(crate) async fn wait(mut self) -> Result<CommandResult> {
        let status = self
            .child_process
            .wait()
            .await
            .stack_err_with_locationless(|| {
                format!("`{}`.wait() -> failed when waiting on child process", self.command)
            })?;
        Ok(CommandResult {
            command: self.command,
            status,
        })
    }
}
