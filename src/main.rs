use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use iam_provision::{std_init, EnvSource, ProvisionConfig, ProvisionError, Provisioner};
use owo_colors::OwoColorize;
use tracing::info;

/// Builds the `iam-secure` image from the current directory and starts a
/// detached container from it, mapping `SERVER_IP:SERVER_PORT` on the host to
/// `DOCKER_EXPOSED_PORT` in the container
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Env file to read instead of searching for `.env`
    #[arg(long, env = "IAM_PROVISION_ENV_FILE")]
    env_file: Option<PathBuf>,
    /// Container tool to invoke
    #[arg(long, default_value = iam_provision::DEFAULT_PROGRAM)]
    program: String,
    /// Directory to run the commands in, used as the build context
    #[arg(long)]
    dir: Option<PathBuf>,
}

async fn run(args: Args) -> Result<(), ProvisionError> {
    let source = EnvSource::load(args.env_file.as_deref())?;
    let config = ProvisionConfig::from_source(&source)?;
    let mut provisioner = Provisioner::new(config).program(&args.program);
    if let Some(dir) = &args.dir {
        provisioner = provisioner.cwd(dir);
    }
    provisioner.provision().await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = std_init() {
        eprintln!("{} {e}", "error:".red());
        return ExitCode::FAILURE
    }
    match run(args).await {
        Ok(()) => {
            info!("provisioning completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {e}", "error:".red());
            // exit codes outside of a byte are truncated by the OS anyway
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}
